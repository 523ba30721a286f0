use std::io;

use quick_error::quick_error;

use crate::wire::WireError;

quick_error! {
    /// Client-side errors. `Connect`/`Closed`/`Io` are transport
    /// failures, `Timeout` is the hard request deadline, `BadResponse`
    /// and `ResponseTooLarge` cover protocol violations by the server.
    #[derive(Debug)]
    pub enum Error {
        Connect(err: io::Error) {
            display("connect error: {}", err)
        }
        Closed {
            display("connection closed by peer")
        }
        Io(err: io::Error) {
            from()
            display("transport error: {}", err)
        }
        Timeout {
            display("request deadline expired")
        }
        BadResponse(reason: String) {
            display("bad response: {}", reason)
        }
        ResponseTooLarge {
            display("response exceeds the configured limit")
        }
        Busy {
            display("a request is already in progress")
        }
        NoRequest {
            display("no request in progress")
        }
        BadUrl(err: WireError) {
            from()
            display("{}", err)
        }
        Json(err: serde_json::Error) {
            from()
            display("json decode error: {}", err)
        }
    }
}

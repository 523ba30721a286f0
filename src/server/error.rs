use quick_error::quick_error;

use crate::wire::WireError;

quick_error! {
    /// Why a request could not be parsed or accepted.
    ///
    /// Note, you should not match the enum values and/or make an
    /// exhaustive match over the enum. More errors will be added at
    /// will. Use the `HttpError` trait instead.
    #[derive(Debug)]
    pub enum RequestError {
        BadRequest(reason: &'static str) {
            display("bad request: {}", reason)
        }
        BadEncoding(err: WireError) {
            from()
            display("bad request encoding: {}", err)
        }
        HeadersTooLarge {
            display("request head exceeds the configured limit")
        }
        PayloadTooLarge {
            display("request body exceeds the configured limit")
        }
        UnsupportedMethod {
            display("method not allowed")
        }
        UnsupportedProtocol {
            display("protocol version not supported")
        }
        MissingHost {
            display("HTTP/1.1 request without Host header")
        }
        ConflictingContentLength {
            display("conflicting Content-Length headers")
        }
        BadContentLength {
            display("Content-Length is not a valid number")
        }
        ForbiddenTransferEncoding {
            display("Transfer-Encoding other than identity")
        }
    }
}

/// An error that can be rendered as a canned HTTP error response.
pub trait HttpError {
    /// HTTP status code and reason phrase for the error page.
    fn http_status(&self) -> (u16, &'static str);
}

impl HttpError for RequestError {
    fn http_status(&self) -> (u16, &'static str) {
        use self::RequestError::*;
        match *self {
            BadRequest(..) => (400, "Bad Request"),
            BadEncoding(..) => (400, "Bad Request"),
            HeadersTooLarge => (400, "Bad Request"),
            PayloadTooLarge => (413, "Payload Too Large"),
            UnsupportedMethod => (405, "Method Not Allowed"),
            UnsupportedProtocol => (505, "HTTP Version Not Supported"),
            MissingHost => (400, "Bad Request"),
            ConflictingContentLength => (400, "Bad Request"),
            BadContentLength => (400, "Bad Request"),
            ForbiddenTransferEncoding => (501, "Not Implemented"),
        }
    }
}

quick_error! {
    /// Caller-side misuse of the response API.
    #[derive(Debug)]
    pub enum RespondError {
        AlreadyResponded {
            display("a response was already sent for this request")
        }
        NotMultipart {
            display("no multipart response in progress")
        }
        OutputOverflow {
            display("outbound buffer exceeds the configured soft cap")
        }
        ConnectionClosed {
            display("connection is closed")
        }
        BadBody(err: WireError) {
            from()
            display("cannot encode body: {}", err)
        }
    }
}

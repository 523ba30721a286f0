/// Reason phrase for a status code, `"-"` when the code is unknown.
///
/// The table covers the codes the engine itself emits plus the common
/// ones applications are expected to use.
pub fn status_message(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        410 => "Gone",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        507 => "Insufficient Storage",
        _ => "-",
    }
}

#[cfg(test)]
mod test {
    use super::status_message;

    #[test]
    fn known_codes() {
        assert_eq!(status_message(200), "OK");
        assert_eq!(status_message(404), "Not Found");
        assert_eq!(status_message(505), "HTTP Version Not Supported");
    }

    #[test]
    fn unknown_code_is_dash() {
        assert_eq!(status_message(299), "-");
        assert_eq!(status_message(599), "-");
    }
}

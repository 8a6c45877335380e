//! Text codec for control-channel requests and replies.
//!
//! Request:
//! ```text
//! SETUP movie.mjpg RTSP/1.0
//! CSeq: 1
//! Transport: RTP/UDP; client_port= 25000
//! ```
//!
//! Reply:
//! ```text
//! RTSP/1.0 200 OK
//! CSeq: 1
//! Session: 123456
//! ```
//!
//! Lines are separated by `\n`; a trailing `\r` on any line is tolerated so
//! CRLF peers parse the same way.  Header names are matched
//! case-insensitively and in any order.  Message boundaries on the byte stream
//! are handled by [`crate::protocol::framing`], not here.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Protocol version token carried on every request and reply line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Errors produced while parsing control-channel text.
#[derive(Debug, Error, PartialEq)]
pub enum RtspError {
    /// The message contained no lines at all.
    #[error("empty message")]
    Empty,

    /// The first line did not have the expected three tokens.
    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),

    /// The request method is not one of the six supported verbs.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A required header was absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// A header was present but its value could not be parsed.
    #[error("invalid {name} header value: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
}

// ── Method ────────────────────────────────────────────────────────────────────

/// Control-channel request verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Stop,
    Teardown,
    Describe,
}

impl Method {
    /// All methods, in protocol order.
    pub const ALL: [Method; 6] = [
        Method::Setup,
        Method::Play,
        Method::Pause,
        Method::Stop,
        Method::Teardown,
        Method::Describe,
    ];

    /// The wire token for this method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Stop => "STOP",
            Method::Teardown => "TEARDOWN",
            Method::Describe => "DESCRIBE",
        }
    }

    /// Whether requests of this kind carry a `Session` header.
    pub fn carries_session(self) -> bool {
        matches!(
            self,
            Method::Play | Method::Pause | Method::Stop | Method::Teardown
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RtspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RtspError::UnknownMethod(s.to_string()))
    }
}

// ── Status codes ──────────────────────────────────────────────────────────────

/// Reply status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK.
    Ok,
    /// 404 NOT FOUND: the named media could not be opened.
    NotFound,
    /// 500 CONNECTION ERROR.
    ConnectionError,
    /// Any other numeric status received from a peer.
    Other(u16),
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
            StatusCode::ConnectionError => 500,
            StatusCode::Other(code) => code,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "NOT FOUND",
            StatusCode::ConnectionError => "CONNECTION ERROR",
            StatusCode::Other(_) => "UNKNOWN",
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            404 => StatusCode::NotFound,
            500 => StatusCode::ConnectionError,
            other => StatusCode::Other(other),
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A control-channel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Media resource name, e.g. `movie.mjpg`.
    pub target: String,
    /// Protocol version token from the start line.
    pub version: String,
    pub cseq: u32,
    /// `Session` header (PLAY/PAUSE/STOP/TEARDOWN).
    pub session: Option<u64>,
    /// Client data-channel port from the `Transport` header (SETUP).
    pub client_port: Option<u16>,
    /// Side-channel port from the `DescPort` header (DESCRIBE).
    pub desc_port: Option<u16>,
}

impl Request {
    /// Creates a request with no optional headers.
    pub fn new(method: Method, target: impl Into<String>, cseq: u32) -> Self {
        Self {
            method,
            target: target.into(),
            version: RTSP_VERSION.to_string(),
            cseq,
            session: None,
            client_port: None,
            desc_port: None,
        }
    }

    pub fn with_session(mut self, session: u64) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = Some(port);
        self
    }

    pub fn with_desc_port(mut self, port: u16) -> Self {
        self.desc_port = Some(port);
        self
    }

    /// Builds the two-line description text returned for DESCRIBE.
    pub fn description(&self) -> String {
        format!("v= {}\nu= {}", self.version, self.target)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.version)?;
        write!(f, "\nCSeq: {}", self.cseq)?;
        if let Some(port) = self.client_port {
            write!(f, "\nTransport: RTP/UDP; client_port= {port}")?;
        }
        if let Some(session) = self.session {
            write!(f, "\nSession: {session}")?;
        }
        if let Some(port) = self.desc_port {
            write!(f, "\nDescPort: {port}")?;
        }
        Ok(())
    }
}

impl FromStr for Request {
    type Err = RtspError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = split_lines(text);
        let start = lines.next().ok_or(RtspError::Empty)?;

        let tokens: Vec<&str> = start.split_whitespace().collect();
        let &[method, target, version] = tokens.as_slice() else {
            return Err(RtspError::MalformedStartLine(start.to_string()));
        };
        let method: Method = method.parse()?;

        let mut request = Request::new(method, target, 0);
        request.version = version.to_string();

        let mut cseq = None;
        for (name, value) in lines.filter_map(split_header) {
            if name.eq_ignore_ascii_case("CSeq") {
                cseq = Some(parse_value("CSeq", value)?);
            } else if name.eq_ignore_ascii_case("Session") {
                request.session = Some(parse_value("Session", value)?);
            } else if name.eq_ignore_ascii_case("Transport") {
                request.client_port = Some(parse_client_port(value)?);
            } else if name.eq_ignore_ascii_case("DescPort") {
                request.desc_port = Some(parse_value("DescPort", value)?);
            }
        }

        request.cseq = cseq.ok_or(RtspError::MissingHeader("CSeq"))?;
        Ok(request)
    }
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// A control-channel reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub cseq: u32,
    pub session: Option<u64>,
}

impl Reply {
    pub fn new(status: StatusCode, cseq: u32, session: Option<u64>) -> Self {
        Self {
            status,
            cseq,
            session,
        }
    }

    /// A `200 OK` reply.
    pub fn ok(cseq: u32, session: Option<u64>) -> Self {
        Self::new(StatusCode::Ok, cseq, session)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{RTSP_VERSION} {}\nCSeq: {}", self.status, self.cseq)?;
        if let Some(session) = self.session {
            write!(f, "\nSession: {session}")?;
        }
        Ok(())
    }
}

impl FromStr for Reply {
    type Err = RtspError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = split_lines(text);
        let start = lines.next().ok_or(RtspError::Empty)?;

        let code = start
            .split_whitespace()
            .nth(1)
            .and_then(|token| token.parse::<u16>().ok())
            .ok_or_else(|| RtspError::MalformedStartLine(start.to_string()))?;

        let mut cseq = None;
        let mut session = None;
        for (name, value) in lines.filter_map(split_header) {
            if name.eq_ignore_ascii_case("CSeq") {
                cseq = Some(parse_value("CSeq", value)?);
            } else if name.eq_ignore_ascii_case("Session") {
                session = Some(parse_value("Session", value)?);
            }
        }

        Ok(Reply {
            status: StatusCode::from_code(code),
            cseq: cseq.ok_or(RtspError::MissingHeader("CSeq"))?,
            session,
        })
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, RtspError> {
    value.parse().map_err(|_| RtspError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

/// Extracts the first port from `RTP/UDP; client_port= 25000[-25001]`.
fn parse_client_port(value: &str) -> Result<u16, RtspError> {
    let invalid = || RtspError::InvalidHeader {
        name: "Transport",
        value: value.to_string(),
    };
    let (_, rest) = value.split_once("client_port=").ok_or_else(invalid)?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().map_err(|_| invalid())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_request_formats_transport_header() {
        // Arrange
        let req = Request::new(Method::Setup, "movie.mjpg", 1).with_client_port(25000);

        // Act
        let text = req.to_string();

        // Assert
        assert_eq!(
            text,
            "SETUP movie.mjpg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP; client_port= 25000"
        );
    }

    #[test]
    fn test_play_request_formats_session_header() {
        let req = Request::new(Method::Play, "movie.mjpg", 2).with_session(123456);
        assert_eq!(
            req.to_string(),
            "PLAY movie.mjpg RTSP/1.0\nCSeq: 2\nSession: 123456"
        );
    }

    #[test]
    fn test_describe_request_formats_desc_port_header() {
        let req = Request::new(Method::Describe, "movie.mjpg", 3).with_desc_port(25001);
        assert_eq!(
            req.to_string(),
            "DESCRIBE movie.mjpg RTSP/1.0\nCSeq: 3\nDescPort: 25001"
        );
    }

    #[test]
    fn test_request_parses_its_own_output() {
        let req = Request::new(Method::Teardown, "clip.mjpg", 9).with_session(42);
        let parsed: Request = req.to_string().parse().unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn test_request_parses_transport_with_space_after_equals() {
        // Arrange – some clients write a space after `client_port=`
        let text = "SETUP movie.mjpg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP; client_port= 5008";

        // Act
        let req: Request = text.parse().unwrap();

        // Assert
        assert_eq!(req.client_port, Some(5008));
    }

    #[test]
    fn test_request_parses_port_range_transport() {
        let text = "SETUP a RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/AVP;unicast;client_port=8000-8001\r\n";
        let req: Request = text.parse().unwrap();
        assert_eq!(req.client_port, Some(8000));
    }

    #[test]
    fn test_request_parses_crlf_and_lowercase_headers() {
        let text = "PAUSE movie.mjpg RTSP/1.0\r\ncseq: 4\r\nsession: 777\r\n";
        let req: Request = text.parse().unwrap();
        assert_eq!(req.method, Method::Pause);
        assert_eq!(req.cseq, 4);
        assert_eq!(req.session, Some(777));
    }

    #[test]
    fn test_request_without_cseq_is_rejected() {
        let result: Result<Request, _> = "PLAY movie.mjpg RTSP/1.0\nSession: 1".parse();
        assert_eq!(result, Err(RtspError::MissingHeader("CSeq")));
    }

    #[test]
    fn test_request_with_unknown_method_is_rejected() {
        let result: Result<Request, _> = "RECORD movie.mjpg RTSP/1.0\nCSeq: 1".parse();
        assert_eq!(result, Err(RtspError::UnknownMethod("RECORD".to_string())));
    }

    #[test]
    fn test_request_with_short_start_line_is_rejected() {
        let result: Result<Request, _> = "PLAY\nCSeq: 1".parse();
        assert!(matches!(result, Err(RtspError::MalformedStartLine(_))));
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let result: Result<Request, _> = "\n\n".parse();
        assert_eq!(result, Err(RtspError::Empty));
    }

    #[test]
    fn test_ok_reply_formats_three_lines() {
        let reply = Reply::ok(5, Some(654321));
        assert_eq!(reply.to_string(), "RTSP/1.0 200 OK\nCSeq: 5\nSession: 654321");
    }

    #[test]
    fn test_reply_without_session_omits_line() {
        let reply = Reply::new(StatusCode::NotFound, 1, None);
        assert_eq!(reply.to_string(), "RTSP/1.0 404 NOT FOUND\nCSeq: 1");
    }

    #[test]
    fn test_reply_parses_status_cseq_and_session() {
        // Arrange
        let text = "RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: 100200\r\n";

        // Act
        let reply: Reply = text.parse().unwrap();

        // Assert
        assert_eq!(reply, Reply::ok(3, Some(100200)));
    }

    #[test]
    fn test_reply_parses_unknown_status_code() {
        let reply: Reply = "RTSP/1.0 454 Session Not Found\nCSeq: 2".parse().unwrap();
        assert_eq!(reply.status, StatusCode::Other(454));
        assert_eq!(reply.session, None);
    }

    #[test]
    fn test_reply_with_non_numeric_status_is_rejected() {
        let result: Result<Reply, _> = "RTSP/1.0 OK\nCSeq: 1".parse();
        assert!(matches!(result, Err(RtspError::MalformedStartLine(_))));
    }

    #[test]
    fn test_reply_with_garbage_cseq_is_rejected() {
        let result: Result<Reply, _> = "RTSP/1.0 200 OK\nCSeq: abc".parse();
        assert!(matches!(
            result,
            Err(RtspError::InvalidHeader { name: "CSeq", .. })
        ));
    }

    #[test]
    fn test_description_uses_version_and_target() {
        let req: Request = "DESCRIBE movie.mjpg RTSP/1.0\nCSeq: 7\nDescPort: 25001"
            .parse()
            .unwrap();
        assert_eq!(req.description(), "v= RTSP/1.0\nu= movie.mjpg");
        assert_eq!(req.desc_port, Some(25001));
    }

    #[test]
    fn test_method_round_trips_through_wire_token() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn test_only_transport_control_methods_carry_session() {
        assert!(!Method::Setup.carries_session());
        assert!(!Method::Describe.carries_session());
        assert!(Method::Play.carries_session());
        assert!(Method::Teardown.carries_session());
    }

    #[test]
    fn test_status_code_maps_known_codes() {
        assert_eq!(StatusCode::from_code(200), StatusCode::Ok);
        assert_eq!(StatusCode::from_code(404), StatusCode::NotFound);
        assert_eq!(StatusCode::from_code(500), StatusCode::ConnectionError);
        assert_eq!(StatusCode::ConnectionError.to_string(), "500 CONNECTION ERROR");
    }
}

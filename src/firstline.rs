//! Start-line tokenizing for requests and responses.

use crate::error::ErrorCode;
use crate::headers::Span;
use crate::scan::is_lws;

/// Outcome of parsing the start-line. Spans are recorded even when the
/// line is fatally malformed so the storage still reflects what arrived;
/// `fatal` suppresses the visitor event.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FirstLineInfo {
    /// First non-LWS byte through the end of the last token, or the whole
    /// line content when tokens are missing.
    pub(crate) line: Span,
    pub(crate) token1: Span,
    pub(crate) token2: Span,
    pub(crate) token3: Span,
    pub(crate) parsed_status: u32,
    pub(crate) warning: Option<ErrorCode>,
    pub(crate) fatal: Option<ErrorCode>,
}

/// Split the start-line into three tokens separated by runs of space or
/// tab. The third token runs to the end of the line with trailing LWS
/// trimmed, so request versions and response reason phrases may contain
/// interior whitespace.
pub(crate) fn parse(block: &[u8], content: Span, is_request: bool) -> FirstLineInfo {
    let end = content.end;
    let empty_at_end = Span::new(end, end);
    let mut info = FirstLineInfo {
        line: empty_at_end,
        token1: empty_at_end,
        token2: empty_at_end,
        token3: empty_at_end,
        parsed_status: 0,
        warning: None,
        fatal: None,
    };

    let mut p = content.start;
    while p < end && is_lws(block[p]) {
        p += 1;
    }
    if p == end {
        info.fatal = Some(if is_request {
            ErrorCode::NoRequestLineInRequest
        } else {
            ErrorCode::NoStatusLineInResponse
        });
        return info;
    }
    let line_start = p;

    let t1_start = p;
    while p < end && !is_lws(block[p]) {
        p += 1;
    }
    info.token1 = Span::new(t1_start, p);
    while p < end && is_lws(block[p]) {
        p += 1;
    }
    if p == end {
        info.line = Span::new(line_start, end);
        if is_request {
            info.warning = Some(ErrorCode::FailedToFindWsAfterRequestMethod);
        } else {
            info.fatal = Some(ErrorCode::FailedToFindWsAfterResponseVersion);
        }
        return info;
    }

    let t2_start = p;
    while p < end && !is_lws(block[p]) {
        p += 1;
    }
    info.token2 = Span::new(t2_start, p);
    while p < end && is_lws(block[p]) {
        p += 1;
    }
    if p == end {
        info.line = Span::new(line_start, end);
        info.warning = Some(if is_request {
            ErrorCode::FailedToFindWsAfterRequestRequestUri
        } else {
            ErrorCode::FailedToFindWsAfterResponseStatuscode
        });
    } else {
        let t3_start = p;
        let mut t3_end = end;
        while t3_end > t3_start && is_lws(block[t3_end - 1]) {
            t3_end -= 1;
        }
        info.token3 = Span::new(t3_start, t3_end);
        info.line = Span::new(line_start, t3_end);
    }

    if !is_request {
        match parse_status_code(info.token2.slice(block)) {
            Some(code) => info.parsed_status = code,
            None => {
                info.warning = None;
                info.fatal = Some(ErrorCode::FailedConvertingStatusCodeToInt);
            }
        }
    }

    info
}

/// Number of LWS-separated tokens on a line.
pub(crate) fn count_tokens(block: &[u8], content: Span) -> usize {
    let mut count = 0;
    let mut in_token = false;
    for &b in content.slice(block) {
        if is_lws(b) {
            in_token = false;
        } else if !in_token {
            in_token = true;
            count += 1;
        }
    }
    count
}

/// Decimal digits only; no sign, no hex, no overflow past 32 bits.
fn parse_status_code(token: &[u8]) -> Option<u32> {
    let mut code: u32 = 0;
    for &b in token {
        if !b.is_ascii_digit() {
            return None;
        }
        code = code.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_line(line: &[u8], is_request: bool) -> FirstLineInfo {
        parse(line, Span::new(0, line.len()), is_request)
    }

    #[test]
    fn request_three_tokens() {
        let line = b"GET /foobar HTTP/1.0";
        let info = parse_line(line, true);
        assert!(info.warning.is_none());
        assert!(info.fatal.is_none());
        assert_eq!(info.line.slice(line), b"GET /foobar HTTP/1.0");
        assert_eq!(info.token1.slice(line), b"GET");
        assert_eq!(info.token2.slice(line), b"/foobar");
        assert_eq!(info.token3.slice(line), b"HTTP/1.0");
    }

    #[test]
    fn tabs_and_trailing_lws_are_tolerated() {
        let line = b"PUT \t /search?q=fo \t HTTP/1.1 \t ";
        let info = parse_line(line, true);
        assert_eq!(info.line.slice(line), b"PUT \t /search?q=fo \t HTTP/1.1");
        assert_eq!(info.token2.slice(line), b"/search?q=fo");
        assert_eq!(info.token3.slice(line), b"HTTP/1.1");
    }

    #[test]
    fn http09_is_a_warning() {
        let line = b"GET /";
        let info = parse_line(line, true);
        assert_eq!(info.warning, Some(ErrorCode::FailedToFindWsAfterRequestRequestUri));
        assert!(info.fatal.is_none());
        assert_eq!(info.token3.slice(line), b"");
    }

    #[test]
    fn lone_method_is_a_warning_and_keeps_trailing_lws_in_line() {
        let line = b"GET  ";
        let info = parse_line(line, true);
        assert_eq!(info.warning, Some(ErrorCode::FailedToFindWsAfterRequestMethod));
        assert_eq!(info.line.slice(line), b"GET  ");
        assert_eq!(info.token1.slice(line), b"GET");
    }

    #[test]
    fn whitespace_only_line_is_fatal() {
        assert_eq!(parse_line(b" ", true).fatal, Some(ErrorCode::NoRequestLineInRequest));
        assert_eq!(parse_line(b"", false).fatal, Some(ErrorCode::NoStatusLineInResponse));
    }

    #[test]
    fn response_reason_keeps_interior_whitespace() {
        let line = b"HTTP/1.1  \t 200 Ok all is well";
        let info = parse_line(line, false);
        assert_eq!(info.parsed_status, 200);
        assert_eq!(info.token3.slice(line), b"Ok all is well");
    }

    #[test]
    fn missing_reason_is_a_warning_and_status_still_parses() {
        let line = b"HTTP/1.1 101";
        let info = parse_line(line, false);
        assert_eq!(info.warning, Some(ErrorCode::FailedToFindWsAfterResponseStatuscode));
        assert_eq!(info.parsed_status, 101);
    }

    #[test]
    fn lone_version_is_fatal_for_responses() {
        let info = parse_line(b"HTTP/1.1", false);
        assert_eq!(info.fatal, Some(ErrorCode::FailedToFindWsAfterResponseVersion));
    }

    #[test]
    fn bad_status_codes_are_fatal() {
        for line in [&b"HTTP/1.1 0x3 Digits only"[..], b"HTTP/1.1 -11 No sign", b"HTTP/1.0 99999999999999999999 OK"] {
            let info = parse_line(line, false);
            assert_eq!(info.fatal, Some(ErrorCode::FailedConvertingStatusCodeToInt), "line: {line:?}");
            assert_eq!(info.parsed_status, 0);
        }
    }

    #[test]
    fn big_status_codes_fit() {
        let info = parse_line(b"HTTP/1.1 4242 Whatever the future holds", false);
        assert_eq!(info.parsed_status, 4242);
    }
}

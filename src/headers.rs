//! Caller-visible header storage and the field-line parsing helpers the
//! framer shares between header blocks and trailers.

use bytes::BytesMut;

use crate::scan;

/// An `(offset, len)` view into a [`HeaderStore`] buffer. Index-based so the
/// buffer may reallocate while growing without invalidating anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub(crate) fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.end]
    }
}

/// One recorded `(name, value)` pair. Multiple records with the same name
/// may coexist; lookups return the first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderLineRecord {
    pub(crate) name: Span,
    pub(crate) value: Span,
}

/// Growable byte buffer holding one message's raw header (or trailer) block
/// plus the span records the framer emitted over it.
///
/// The buffer grows monotonically while a block accumulates, so emitted
/// spans stay valid until [`clear`](HeaderStore::clear).
#[derive(Debug, Default)]
pub struct HeaderStore {
    buf: BytesMut,
    records: Vec<HeaderLineRecord>,
    first_line: Span,
    token1: Span,
    token2: Span,
    token3: Span,
    parsed_status: u32,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first line exactly as framed, line terminator excluded.
    pub fn first_line(&self) -> &[u8] {
        self.first_line.slice(&self.buf)
    }

    pub fn request_method(&self) -> &[u8] {
        self.token1.slice(&self.buf)
    }

    pub fn request_uri(&self) -> &[u8] {
        self.token2.slice(&self.buf)
    }

    pub fn request_version(&self) -> &[u8] {
        self.token3.slice(&self.buf)
    }

    pub fn response_version(&self) -> &[u8] {
        self.token1.slice(&self.buf)
    }

    pub fn response_code(&self) -> &[u8] {
        self.token2.slice(&self.buf)
    }

    pub fn response_reason_phrase(&self) -> &[u8] {
        self.token3.slice(&self.buf)
    }

    /// Status code as parsed from the first line; zero for requests.
    pub fn parsed_status_code(&self) -> u32 {
        self.parsed_status
    }

    /// First value recorded under `name` (ASCII case-insensitive). Names
    /// are byte strings; opaque non-UTF-8 names look up fine.
    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        let name = name.as_ref();
        self.records
            .iter()
            .find(|r| r.name.slice(&self.buf).eq_ignore_ascii_case(name))
            .map(|r| r.value.slice(&self.buf))
    }

    pub fn has_header(&self, name: impl AsRef<[u8]>) -> bool {
        self.get(name).is_some()
    }

    /// All recorded `(name, value)` pairs in wire order.
    pub fn lines(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.records
            .iter()
            .map(|r| (r.name.slice(&self.buf), r.value.slice(&self.buf)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all bytes and records; spans handed out earlier are dead.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.records.clear();
        self.first_line = Span::default();
        self.token1 = Span::default();
        self.token2 = Span::default();
        self.token3 = Span::default();
        self.parsed_status = 0;
    }

    pub(crate) fn write_from_framer(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn add_record(&mut self, record: HeaderLineRecord) {
        self.records.push(record);
    }

    pub(crate) fn set_first_line(&mut self, line: Span, t1: Span, t2: Span, t3: Span) {
        self.first_line = line;
        self.token1 = t1;
        self.token2 = t2;
        self.token3 = t3;
    }

    pub(crate) fn set_parsed_status(&mut self, code: u32) {
        self.parsed_status = code;
    }
}

/// Split a raw block into physical line spans, each including its `\n`.
pub(crate) fn split_physical_lines(block: &[u8]) -> Vec<Span> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in block.iter().enumerate() {
        if b == b'\n' {
            lines.push(Span::new(start, i + 1));
            start = i + 1;
        }
    }
    if start < block.len() {
        lines.push(Span::new(start, block.len()));
    }
    lines
}

/// End of a line's content: the span minus its `\n` and an optional `\r`
/// before it.
pub(crate) fn content_end(block: &[u8], line: Span) -> usize {
    let mut end = line.end;
    if end > line.start && block[end - 1] == b'\n' {
        end -= 1;
    }
    if end > line.start && block[end - 1] == b'\r' {
        end -= 1;
    }
    end
}

/// Trim `{SP, HTAB, CR, LF}` from both ends. Interior bytes (including
/// folded CR/LF runs) are preserved.
pub(crate) fn trim(block: &[u8], span: Span) -> Span {
    let mut start = span.start;
    let mut end = span.end;
    while start < end && matches!(block[start], b' ' | b'\t' | b'\r' | b'\n') {
        start += 1;
    }
    while end > start && matches!(block[end - 1], b' ' | b'\t' | b'\r' | b'\n') {
        end -= 1;
    }
    Span::new(start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldError {
    /// Nothing before the colon.
    EmptyName,
    /// Whitespace, CR/LF, or (policy permitting) a control octet in the name.
    InvalidNameChar,
}

/// A field line picked apart at its first colon. The record is produced
/// even for malformed lines; `error`/`missing_colon` tell the framer what
/// to report.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParsedField {
    pub(crate) name: Span,
    pub(crate) value: Span,
    pub(crate) missing_colon: bool,
    pub(crate) error: Option<FieldError>,
}

/// Parse one logical line (continuations already merged, terminator
/// excluded). `check_name_ctl` extends name validation to control octets;
/// opaque high-bit bytes are always allowed in names.
pub(crate) fn parse_field_line(block: &[u8], content: Span, check_name_ctl: bool) -> ParsedField {
    let colon = content
        .slice(block)
        .iter()
        .position(|&b| b == b':')
        .map(|p| content.start + p);

    let Some(colon) = colon else {
        return ParsedField {
            name: trim(block, content),
            value: Span::new(content.end, content.end),
            missing_colon: true,
            error: None,
        };
    };

    let name = Span::new(content.start, colon);
    let value = trim(block, Span::new(colon + 1, content.end));

    if name.is_empty() {
        return ParsedField { name, value, missing_colon: false, error: Some(FieldError::EmptyName) };
    }

    let bad_name_byte = name.slice(block).iter().any(|&b| {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n') || (check_name_ctl && scan::is_ctl(b))
    });
    let error = bad_name_byte.then_some(FieldError::InvalidNameChar);

    ParsedField { name, value, missing_colon: false, error }
}

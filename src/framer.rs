//! The push-parser state machine.

use std::collections::HashMap;
use std::mem;

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::chunk::{ChunkSizeAccumulator, SizeByte};
use crate::error::ErrorCode;
use crate::firstline::{self, FirstLineInfo};
use crate::headers::{
    content_end, parse_field_line, split_physical_lines, FieldError, HeaderLineRecord, HeaderStore,
    Span,
};
use crate::policy::{HttpValidationPolicy, InvalidCharsLevel};
use crate::scan::{is_invalid_value_char, is_lws, TerminatorWindow};
use crate::visitor::Visitor;

/// Where the framer is inside the current message.
///
/// States only move forward; the sole way back to
/// `ReadingHeaderAndFirstline` is [`Framer::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ReadingHeaderAndFirstline,
    ReadingChunkLength,
    ReadingChunkExtension,
    ReadingChunkData,
    ReadingChunkTerm,
    ReadingLastChunkTerm,
    ReadingTrailer,
    ReadingUntilClose,
    ReadingContent,
    MessageFullyRead,
    Error,
}

impl ParseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseState::ReadingHeaderAndFirstline => "READING_HEADER_AND_FIRSTLINE",
            ParseState::ReadingChunkLength => "READING_CHUNK_LENGTH",
            ParseState::ReadingChunkExtension => "READING_CHUNK_EXTENSION",
            ParseState::ReadingChunkData => "READING_CHUNK_DATA",
            ParseState::ReadingChunkTerm => "READING_CHUNK_TERM",
            ParseState::ReadingLastChunkTerm => "READING_LAST_CHUNK_TERM",
            ParseState::ReadingTrailer => "READING_TRAILER",
            ParseState::ReadingUntilClose => "READING_UNTIL_CLOSE",
            ParseState::ReadingContent => "READING_CONTENT",
            ParseState::MessageFullyRead => "MESSAGE_FULLY_READ",
            ParseState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_MAX_HEADER_LENGTH: usize = 64 * 1024;

/// The raw header block accumulated so far: the attached store's buffer, or
/// the internal scratch buffer when no store is attached.
macro_rules! active_block {
    ($framer:expr) => {
        match $framer.headers.as_ref() {
            Some(store) => store.raw(),
            None => &$framer.scratch[..],
        }
    };
}

/// Incremental HTTP/1.x message framer.
///
/// Feed bytes with [`process_input`](Framer::process_input); structured
/// events arrive at the attached [`Visitor`]. The framer never consumes
/// past the end of the current message, so the return value tells the
/// caller where the next message (or the body it plans to splice) begins.
pub struct Framer {
    state: ParseState,
    is_request: bool,
    request_was_head: bool,
    max_header_length: usize,

    visitor: Option<Box<dyn Visitor>>,
    headers: Option<HeaderStore>,
    trailer: Option<HeaderStore>,
    continue_headers: Option<HeaderStore>,
    scratch: BytesMut,

    invalid_chars_level: InvalidCharsLevel,
    invalid_chars: HashMap<u8, usize>,
    policy: HttpValidationPolicy,

    error_code: ErrorCode,
    is_error: bool,

    // Header-phase bookkeeping.
    term: TerminatorWindow,
    header_bytes: usize,
    seen_first_byte: bool,
    pending_blank_cr: bool,
    firstline_done: bool,

    // Body bookkeeping.
    content_length: Option<u64>,
    content_remaining: u64,
    te_is_chunked: bool,
    chunk_size: ChunkSizeAccumulator,
    chunk_remaining: u64,
    chunk_ext_cr_seen: bool,
    chunk_ext_emitted: bool,

    trailer_bytes: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            state: ParseState::ReadingHeaderAndFirstline,
            is_request: true,
            request_was_head: false,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
            visitor: None,
            headers: Some(HeaderStore::new()),
            trailer: None,
            continue_headers: None,
            scratch: BytesMut::new(),
            invalid_chars_level: InvalidCharsLevel::Off,
            invalid_chars: HashMap::new(),
            policy: HttpValidationPolicy::default(),
            error_code: ErrorCode::BalsaNoError,
            is_error: false,
            term: TerminatorWindow::new(),
            header_bytes: 0,
            seen_first_byte: false,
            pending_blank_cr: false,
            firstline_done: false,
            content_length: None,
            content_remaining: 0,
            te_is_chunked: false,
            chunk_size: ChunkSizeAccumulator::new(),
            chunk_remaining: 0,
            chunk_ext_cr_seen: false,
            chunk_ext_emitted: false,
            trailer_bytes: 0,
        }
    }

    /// Return to the initial state, keeping direction, visitor, stores,
    /// limits and policies. Attached stores are cleared.
    pub fn reset(&mut self) {
        self.state = ParseState::ReadingHeaderAndFirstline;
        self.error_code = ErrorCode::BalsaNoError;
        self.is_error = false;
        if let Some(h) = self.headers.as_mut() {
            h.clear();
        }
        if let Some(t) = self.trailer.as_mut() {
            t.clear();
        }
        if let Some(c) = self.continue_headers.as_mut() {
            c.clear();
        }
        self.scratch.clear();
        self.invalid_chars.clear();
        self.term.reset();
        self.header_bytes = 0;
        self.seen_first_byte = false;
        self.pending_blank_cr = false;
        self.firstline_done = false;
        self.content_length = None;
        self.content_remaining = 0;
        self.te_is_chunked = false;
        self.chunk_size.reset();
        self.chunk_remaining = 0;
        self.chunk_ext_cr_seen = false;
        self.chunk_ext_emitted = false;
        self.trailer_bytes = 0;
    }

    pub fn set_is_request(&mut self, is_request: bool) {
        self.is_request = is_request;
    }

    /// Hint that this response answers a HEAD request, so headers imply no
    /// body regardless of Content-Length.
    pub fn set_request_was_head(&mut self, was_head: bool) {
        self.request_was_head = was_head;
    }

    pub fn set_visitor(&mut self, visitor: Option<Box<dyn Visitor>>) {
        self.visitor = visitor;
    }

    pub fn set_header_store(&mut self, store: Option<HeaderStore>) {
        self.headers = store;
    }

    pub fn set_trailer_store(&mut self, store: Option<HeaderStore>) {
        self.trailer = store;
    }

    pub fn set_continue_store(&mut self, store: Option<HeaderStore>) {
        self.continue_headers = store;
    }

    pub fn headers(&self) -> Option<&HeaderStore> {
        self.headers.as_ref()
    }

    pub fn trailer(&self) -> Option<&HeaderStore> {
        self.trailer.as_ref()
    }

    pub fn continue_headers(&self) -> Option<&HeaderStore> {
        self.continue_headers.as_ref()
    }

    pub fn take_header_store(&mut self) -> Option<HeaderStore> {
        self.headers.take()
    }

    pub fn take_trailer_store(&mut self) -> Option<HeaderStore> {
        self.trailer.take()
    }

    pub fn set_max_header_length(&mut self, max: usize) {
        self.max_header_length = max;
    }

    pub fn max_header_length(&self) -> usize {
        self.max_header_length
    }

    pub fn set_invalid_chars_level(&mut self, level: InvalidCharsLevel) {
        self.invalid_chars_level = level;
    }

    pub fn invalid_chars_level(&self) -> InvalidCharsLevel {
        self.invalid_chars_level
    }

    pub fn track_invalid_chars(&self) -> bool {
        !self.invalid_chars_level.is_off()
    }

    /// Frequency map of offending octets seen under the `Warn` policy.
    pub fn invalid_chars(&self) -> &HashMap<u8, usize> {
        &self.invalid_chars
    }

    pub fn set_http_validation_policy(&mut self, policy: HttpValidationPolicy) {
        self.policy = policy;
    }

    pub fn http_validation_policy(&self) -> HttpValidationPolicy {
        self.policy
    }

    pub fn parse_state(&self) -> ParseState {
        self.state
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn message_fully_read(&self) -> bool {
        self.state == ParseState::MessageFullyRead
    }

    /// Consume bytes from `input`, firing visitor events. Returns how many
    /// bytes were taken; the caller re-offers the rest later. Terminal
    /// states consume nothing.
    pub fn process_input(&mut self, input: &[u8]) -> usize {
        match self.state {
            ParseState::Error | ParseState::MessageFullyRead => 0,
            ParseState::ReadingHeaderAndFirstline => self.process_header_input(input),
            ParseState::ReadingContent => self.process_content(input),
            ParseState::ReadingUntilClose => self.process_until_close(input),
            ParseState::ReadingTrailer => self.process_trailer_input(input),
            ParseState::ReadingChunkLength
            | ParseState::ReadingChunkExtension
            | ParseState::ReadingChunkData
            | ParseState::ReadingChunkTerm
            | ParseState::ReadingLastChunkTerm => self.process_chunked(input),
        }
    }

    /// Body bytes the caller may transport out-of-band right now.
    pub fn bytes_safe_to_splice(&self) -> u64 {
        match self.state {
            ParseState::ReadingUntilClose => u64::MAX,
            ParseState::ReadingContent => self.content_remaining,
            ParseState::ReadingChunkData => self.chunk_remaining,
            _ => 0,
        }
    }

    /// Deduct `count` body bytes delivered through a side channel.
    pub fn bytes_spliced(&mut self, count: u64) {
        match self.state {
            ParseState::ReadingUntilClose => {}
            ParseState::ReadingContent => {
                if count > self.content_remaining {
                    self.fatal_error(ErrorCode::CalledBytesSplicedAndExceededSafeSpliceAmount);
                    return;
                }
                self.content_remaining -= count;
                if self.content_remaining == 0 {
                    self.message_done_now();
                }
            }
            ParseState::ReadingChunkData => {
                if count > self.chunk_remaining {
                    self.fatal_error(ErrorCode::CalledBytesSplicedAndExceededSafeSpliceAmount);
                    return;
                }
                self.chunk_remaining -= count;
                if self.chunk_remaining == 0 {
                    self.state = ParseState::ReadingChunkTerm;
                }
            }
            _ => self.fatal_error(ErrorCode::CalledBytesSplicedWhenUnsafeToDoSo),
        }
    }

    fn fatal_error(&mut self, code: ErrorCode) {
        if self.is_error {
            return;
        }
        self.error_code = code;
        self.is_error = true;
        self.state = ParseState::Error;
        warn!(code = %code, "message framing failed");
        if let Some(v) = self.visitor.as_mut() {
            v.handle_error(code);
        }
    }

    fn warn_code(&mut self, code: ErrorCode) {
        if !self.is_error {
            self.error_code = code;
        }
        trace!(code = %code, "framing warning");
        if let Some(v) = self.visitor.as_mut() {
            v.handle_warning(code);
        }
    }

    fn message_done_now(&mut self) {
        self.state = ParseState::MessageFullyRead;
        trace!("message fully read");
        if let Some(v) = self.visitor.as_mut() {
            v.message_done();
        }
    }

    fn emit_raw_body(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(v) = self.visitor.as_mut() {
            v.on_raw_body_input(bytes);
        }
    }

    fn emit_body_chunk(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(v) = self.visitor.as_mut() {
            v.on_body_chunk_input(bytes);
        }
    }

    fn append_header_bytes(&mut self, bytes: &[u8]) {
        match self.headers.as_mut() {
            Some(store) => store.write_from_framer(bytes),
            None => self.scratch.extend_from_slice(bytes),
        }
    }

    // ---- Header phase ------------------------------------------------

    fn process_header_input(&mut self, input: &[u8]) -> usize {
        let mut i = 0;

        // Silently eat blank lines before the first real byte.
        while !self.seen_first_byte && i < input.len() {
            let b = input[i];
            if self.pending_blank_cr {
                self.pending_blank_cr = false;
                if b == b'\n' {
                    i += 1;
                    continue;
                }
                // The lone CR turns out to start the header block.
                self.term.push(b'\r');
                self.seen_first_byte = true;
                if let Err(_taken) = self.append_header_segment(b"\r") {
                    return i;
                }
                break;
            }
            match b {
                b'\n' => i += 1,
                b'\r' => {
                    self.pending_blank_cr = true;
                    i += 1;
                }
                _ => self.seen_first_byte = true,
            }
        }
        if i >= input.len() {
            return i;
        }

        let mut start = i;
        let mut pos = i;
        while pos < input.len() {
            let b = input[pos];
            let hit = self.term.push(b);
            pos += 1;
            if hit.is_some() {
                if let Err(taken) = self.append_header_segment(&input[start..pos]) {
                    return start + taken;
                }
                return match self.finish_header_block() {
                    BlockOutcome::Done => pos,
                    BlockOutcome::ContinuePrelude => pos + self.process_header_input(&input[pos..]),
                };
            }
            if b == b'\n' && !self.firstline_done {
                self.firstline_done = true;
                if self.is_request {
                    // An HTTP/0.9 request ends at its only line, so the
                    // first line must be examined as soon as it is whole.
                    if let Err(taken) = self.append_header_segment(&input[start..pos]) {
                        return start + taken;
                    }
                    start = pos;
                    if self.try_finish_http09() {
                        return pos;
                    }
                }
            }
        }

        match self.append_header_segment(&input[start..]) {
            Ok(()) => input.len(),
            Err(taken) => start + taken,
        }
    }

    /// Append a slice of the current header block, enforcing
    /// `max_header_length` inclusive of the terminator. On overrun, appends
    /// what fits, fails the parse, and reports how much was taken.
    fn append_header_segment(&mut self, segment: &[u8]) -> Result<(), usize> {
        let room = self.max_header_length.saturating_sub(self.header_bytes);
        if segment.len() > room {
            self.append_header_bytes(&segment[..room]);
            self.header_bytes += room;
            self.fatal_error(ErrorCode::HeadersTooLong);
            return Err(room);
        }
        self.append_header_bytes(segment);
        self.header_bytes += segment.len();
        Ok(())
    }

    /// The request's first line is complete. If it is missing the version
    /// token the message is an HTTP/0.9 request and ends here; returns
    /// whether the line consumed the whole message (or failed it).
    fn try_finish_http09(&mut self) -> bool {
        let token_count = {
            let block = active_block!(self);
            let first = split_physical_lines(block).first().copied().unwrap_or_default();
            let content = Span::new(first.start, content_end(block, first));
            firstline::count_tokens(block, content)
        };
        if token_count >= 3 {
            return false;
        }
        if token_count == 0 {
            self.fatal_error(ErrorCode::NoRequestLineInRequest);
            return true;
        }
        self.finish_header_block();
        true
    }

    fn finish_header_block(&mut self) -> BlockOutcome {
        let parsed = {
            let block = active_block!(self);
            parse_header_block(block, self.is_request, self.policy, self.invalid_chars_level)
        };

        // The storage reflects whatever arrived, malformed or not.
        if let Some(store) = self.headers.as_mut() {
            store.set_first_line(
                parsed.first.line,
                parsed.first.token1,
                parsed.first.token2,
                parsed.first.token3,
            );
            store.set_parsed_status(parsed.first.parsed_status);
        }

        if let Some(code) = parsed.first.fatal {
            self.fatal_error(code);
            return BlockOutcome::Done;
        }
        if let Some(code) = parsed.first.warning {
            self.warn_code(code);
        }

        {
            let block = active_block!(self);
            let line = parsed.first.line.slice(block);
            let t1 = parsed.first.token1.slice(block);
            let t2 = parsed.first.token2.slice(block);
            let t3 = parsed.first.token3.slice(block);
            if let Some(v) = self.visitor.as_mut() {
                if self.is_request {
                    v.on_request_first_line(line, t1, t2, t3);
                } else {
                    v.on_response_first_line(line, t1, t2, t3);
                }
            }
        }

        for line in &parsed.lines {
            if let Some(code) = line.warning {
                self.warn_code(code);
            }
            if let Some(store) = self.headers.as_mut() {
                store.add_record(line.record);
            }
            if line.emit {
                let block = active_block!(self);
                let name = line.record.name.slice(block);
                let value = line.record.value.slice(block);
                if let Some(v) = self.visitor.as_mut() {
                    v.on_header(name, value);
                }
            }
        }

        if !parsed.invalid_octets.is_empty() {
            for &b in &parsed.invalid_octets {
                *self.invalid_chars.entry(b).or_insert(0) += 1;
            }
            self.warn_code(ErrorCode::InvalidHeaderCharacter);
        }

        {
            let block = active_block!(self);
            if let Some(v) = self.visitor.as_mut() {
                v.on_header_input(block);
            }
        }

        if let Some(code) = parsed.fatal {
            self.fatal_error(code);
            return BlockOutcome::Done;
        }

        let status = parsed.first.parsed_status;
        if !self.is_request && (100..200).contains(&status) && self.continue_headers.is_some() {
            self.finish_continue_prelude(&parsed);
            return BlockOutcome::ContinuePrelude;
        }

        if let Some(h) = self.headers.as_ref() {
            if let Some(v) = self.visitor.as_mut() {
                v.process_headers(h);
            }
        }
        if let Some(v) = self.visitor.as_mut() {
            v.header_done();
        }

        self.content_length = parsed.content_length;
        self.te_is_chunked = parsed.te_chunked;
        self.resolve_body_mode(parsed.first, status);
        BlockOutcome::Done
    }

    fn resolve_body_mode(&mut self, first: FirstLineInfo, status: u32) {
        if self.te_is_chunked {
            // Transfer-Encoding wins over Content-Length.
            self.state = ParseState::ReadingChunkLength;
            self.chunk_size.reset();
            return;
        }
        if let Some(length) = self.content_length {
            if length == 0 {
                self.message_done_now();
            } else {
                self.content_remaining = length;
                self.state = ParseState::ReadingContent;
            }
            return;
        }
        if self.is_request {
            let requires_body = {
                let block = active_block!(self);
                let method = first.token1.slice(block);
                method == b"POST" || method == b"PUT"
            };
            if requires_body && self.policy.require_content_length {
                self.fatal_error(ErrorCode::RequiredBodyButNoContentLength);
            } else {
                self.message_done_now();
            }
            return;
        }
        if (100..200).contains(&status) || status == 204 || status == 304 || self.request_was_head {
            self.message_done_now();
        } else {
            self.state = ParseState::ReadingUntilClose;
        }
    }

    /// Move a 1xx block into the continue store and rearm for the real
    /// response headers.
    fn finish_continue_prelude(&mut self, parsed: &ParsedBlock) {
        match (self.headers.as_mut(), self.continue_headers.as_mut()) {
            (Some(h), Some(c)) => {
                mem::swap(h, c);
                h.clear();
            }
            (None, Some(c)) => {
                c.clear();
                c.write_from_framer(&self.scratch);
                c.set_first_line(
                    parsed.first.line,
                    parsed.first.token1,
                    parsed.first.token2,
                    parsed.first.token3,
                );
                c.set_parsed_status(parsed.first.parsed_status);
                for line in &parsed.lines {
                    c.add_record(line.record);
                }
            }
            _ => {}
        }

        if let Some(c) = self.continue_headers.as_ref() {
            if let Some(v) = self.visitor.as_mut() {
                v.process_headers(c);
                v.on_interim_headers(c);
            }
        }
        if let Some(v) = self.visitor.as_mut() {
            v.continue_header_done();
        }
        trace!(status = parsed.first.parsed_status, "interim response consumed");

        self.scratch.clear();
        self.term.reset();
        self.header_bytes = 0;
        self.seen_first_byte = false;
        self.pending_blank_cr = false;
        self.firstline_done = false;
    }

    // ---- Sized and until-close bodies --------------------------------

    fn process_content(&mut self, input: &[u8]) -> usize {
        let take = self.content_remaining.min(input.len() as u64) as usize;
        if take > 0 {
            self.emit_raw_body(&input[..take]);
            self.emit_body_chunk(&input[..take]);
            self.content_remaining -= take as u64;
        }
        if self.content_remaining == 0 {
            self.message_done_now();
        }
        take
    }

    fn process_until_close(&mut self, input: &[u8]) -> usize {
        self.emit_raw_body(input);
        self.emit_body_chunk(input);
        input.len()
    }

    // ---- Chunked body ------------------------------------------------

    fn process_chunked(&mut self, input: &[u8]) -> usize {
        let len = input.len();
        let mut i = 0;
        let mut raw_mark = 0;
        let mut ext_start = 0;

        while i < len {
            match self.state {
                ParseState::ReadingChunkLength => {
                    let b = input[i];
                    i += 1;
                    match self.chunk_size.push(b) {
                        SizeByte::Digit => {}
                        SizeByte::ExtensionStart => {
                            self.emit_chunk_length();
                            self.state = ParseState::ReadingChunkExtension;
                            ext_start = i - 1;
                        }
                        SizeByte::LineCr => {
                            self.emit_chunk_length();
                            self.state = ParseState::ReadingChunkExtension;
                            self.chunk_ext_cr_seen = true;
                        }
                        SizeByte::LineLf => {
                            self.emit_chunk_length();
                            self.emit_chunk_extension(&[]);
                            raw_mark = self.finish_chunk_size_line(input, raw_mark, i);
                        }
                        SizeByte::Invalid => {
                            self.emit_raw_body(&input[raw_mark..i]);
                            self.fatal_error(ErrorCode::InvalidChunkLength);
                            return i;
                        }
                        SizeByte::Overflow => {
                            self.emit_raw_body(&input[raw_mark..i]);
                            self.fatal_error(ErrorCode::ChunkLengthOverflow);
                            return i;
                        }
                    }
                }
                ParseState::ReadingChunkExtension => {
                    if self.chunk_ext_cr_seen {
                        // Extension ended at a CR; everything up to the LF
                        // is discarded.
                        while i < len && input[i] != b'\n' {
                            i += 1;
                        }
                        if i < len {
                            i += 1;
                            if !self.chunk_ext_emitted {
                                self.emit_chunk_extension(&[]);
                            }
                            raw_mark = self.finish_chunk_size_line(input, raw_mark, i);
                        }
                        continue;
                    }
                    while i < len && input[i] != b'\n' && input[i] != b'\r' {
                        i += 1;
                    }
                    if i > ext_start {
                        self.emit_chunk_extension(&input[ext_start..i]);
                        self.chunk_ext_emitted = true;
                        ext_start = i;
                    }
                    if i < len {
                        if input[i] == b'\r' {
                            i += 1;
                            self.chunk_ext_cr_seen = true;
                        } else {
                            i += 1;
                            if !self.chunk_ext_emitted {
                                self.emit_chunk_extension(&[]);
                            }
                            raw_mark = self.finish_chunk_size_line(input, raw_mark, i);
                        }
                    }
                }
                ParseState::ReadingChunkData => {
                    let take = self.chunk_remaining.min((len - i) as u64) as usize;
                    if take > 0 {
                        self.emit_body_chunk(&input[i..i + take]);
                        i += take;
                        self.chunk_remaining -= take as u64;
                    }
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ReadingChunkTerm;
                    }
                }
                ParseState::ReadingChunkTerm => {
                    while i < len && input[i] != b'\n' {
                        i += 1;
                    }
                    if i < len {
                        i += 1;
                        self.state = ParseState::ReadingChunkLength;
                        self.chunk_size.reset();
                    }
                }
                ParseState::ReadingLastChunkTerm => match input[i] {
                    b'\n' => {
                        i += 1;
                        self.emit_raw_body(&input[raw_mark..i]);
                        self.message_done_now();
                        return i;
                    }
                    b'\r' => i += 1,
                    _ => {
                        self.emit_raw_body(&input[raw_mark..i]);
                        self.state = ParseState::ReadingTrailer;
                        self.term.reset();
                        self.trailer_bytes = 0;
                        return i + self.process_trailer_input(&input[i..]);
                    }
                },
                _ => {
                    self.fatal_error(ErrorCode::InternalLogicError);
                    return i;
                }
            }
        }

        if self.state == ParseState::ReadingChunkExtension
            && !self.chunk_ext_cr_seen
            && len > ext_start
        {
            // The size token ended on the last byte of this input; the
            // delimiter still belongs to the extension.
            self.emit_chunk_extension(&input[ext_start..len]);
            self.chunk_ext_emitted = true;
        }
        self.emit_raw_body(&input[raw_mark..len]);
        len
    }

    fn emit_chunk_length(&mut self) {
        let length = self.chunk_size.value();
        if let Some(v) = self.visitor.as_mut() {
            v.on_chunk_length(length);
        }
    }

    fn emit_chunk_extension(&mut self, bytes: &[u8]) {
        if let Some(v) = self.visitor.as_mut() {
            v.on_chunk_extension_input(bytes);
        }
    }

    /// Chunk-size line fully consumed: flush its raw bytes and move to the
    /// data (or last-chunk) state.
    fn finish_chunk_size_line(&mut self, input: &[u8], raw_mark: usize, line_end: usize) -> usize {
        self.emit_raw_body(&input[raw_mark..line_end]);
        let size = self.chunk_size.value();
        self.chunk_size.reset();
        self.chunk_ext_cr_seen = false;
        self.chunk_ext_emitted = false;
        if size == 0 {
            self.state = ParseState::ReadingLastChunkTerm;
        } else {
            self.chunk_remaining = size;
            self.state = ParseState::ReadingChunkData;
        }
        line_end
    }

    // ---- Trailer -----------------------------------------------------

    fn process_trailer_input(&mut self, input: &[u8]) -> usize {
        let mut terminator_at = None;
        for (j, &b) in input.iter().enumerate() {
            if self.term.push(b).is_some() {
                terminator_at = Some(j + 1);
                break;
            }
        }

        let scan_end = terminator_at.unwrap_or(input.len());
        if self.trailer_bytes + scan_end > self.max_header_length {
            let allowed = self.max_header_length - self.trailer_bytes.min(self.max_header_length);
            if let Some(store) = self.trailer.as_mut() {
                store.write_from_framer(&input[..allowed]);
            }
            self.trailer_bytes += allowed;
            self.fatal_error(ErrorCode::TrailerTooLong);
            return allowed;
        }

        if let Some(store) = self.trailer.as_mut() {
            store.write_from_framer(&input[..scan_end]);
        }
        self.trailer_bytes += scan_end;

        let Some(end) = terminator_at else {
            let consumed = &input[..scan_end];
            if let Some(v) = self.visitor.as_mut() {
                if !consumed.is_empty() {
                    v.on_trailer_input(consumed);
                }
            }
            return scan_end;
        };

        if self.trailer.is_some() {
            let parsed = {
                let block = self.trailer.as_ref().map(|t| t.raw()).unwrap_or(&[]);
                parse_trailer_block(block, self.invalid_chars_level)
            };
            for line in &parsed.lines {
                if let Some(code) = line.warning {
                    self.warn_code(code);
                }
                if let Some(store) = self.trailer.as_mut() {
                    store.add_record(line.record);
                }
                if line.emit {
                    let block = self.trailer.as_ref().map(|t| t.raw()).unwrap_or(&[]);
                    let name = line.record.name.slice(block);
                    let value = line.record.value.slice(block);
                    if let Some(v) = self.visitor.as_mut() {
                        v.on_header(name, value);
                    }
                }
            }
            if !parsed.invalid_octets.is_empty() {
                for &b in &parsed.invalid_octets {
                    *self.invalid_chars.entry(b).or_insert(0) += 1;
                }
                self.warn_code(ErrorCode::InvalidHeaderCharacter);
            }
            if let Some(code) = parsed.fatal {
                self.fatal_error(code);
                return end;
            }
        }

        if let Some(v) = self.visitor.as_mut() {
            v.on_trailer_input(&input[..end]);
        }
        if let Some(t) = self.trailer.as_ref() {
            if let Some(v) = self.visitor.as_mut() {
                v.process_trailers(t);
            }
        }
        self.message_done_now();
        end
    }
}

enum BlockOutcome {
    Done,
    ContinuePrelude,
}

struct LineOutcome {
    record: HeaderLineRecord,
    emit: bool,
    warning: Option<ErrorCode>,
}

struct ParsedBlock {
    first: FirstLineInfo,
    lines: Vec<LineOutcome>,
    fatal: Option<ErrorCode>,
    invalid_octets: Vec<u8>,
    content_length: Option<u64>,
    te_chunked: bool,
}

fn set_fatal(slot: &mut Option<ErrorCode>, code: ErrorCode) {
    if slot.is_none() {
        *slot = Some(code);
    }
}

fn scan_invalid_octets(
    block: &[u8],
    span: Span,
    level: InvalidCharsLevel,
    octets: &mut Vec<u8>,
    fatal: &mut Option<ErrorCode>,
) {
    if level.is_off() {
        return;
    }
    for &b in span.slice(block) {
        if is_invalid_value_char(b) {
            match level {
                InvalidCharsLevel::Warn => octets.push(b),
                InvalidCharsLevel::Fatal => {
                    set_fatal(fatal, ErrorCode::InvalidHeaderCharacter);
                    return;
                }
                InvalidCharsLevel::Off => unreachable!(),
            }
        }
    }
}

fn parse_header_block(
    block: &[u8],
    is_request: bool,
    policy: HttpValidationPolicy,
    level: InvalidCharsLevel,
) -> ParsedBlock {
    let mut physical = split_physical_lines(block);
    if let Some(last) = physical.last() {
        if content_end(block, *last) == last.start {
            physical.pop();
        }
    }

    let first_content = physical
        .first()
        .map(|line| Span::new(line.start, content_end(block, *line)))
        .unwrap_or_default();
    let first = firstline::parse(block, first_content, is_request);

    let mut parsed = ParsedBlock {
        first,
        lines: Vec::new(),
        fatal: None,
        invalid_octets: Vec::new(),
        content_length: None,
        te_chunked: false,
    };
    if first.fatal.is_some() {
        return parsed;
    }

    scan_invalid_octets(block, first_content, level, &mut parsed.invalid_octets, &mut parsed.fatal);

    // Stitch obs-fold continuations onto their predecessors.
    let mut logical: Vec<Span> = Vec::new();
    let mut folded = false;
    for line in physical.iter().skip(1) {
        let end = content_end(block, *line);
        if is_lws(block[line.start]) {
            match logical.last_mut() {
                Some(prev) => {
                    prev.end = end;
                    folded = true;
                }
                // Continuation with nothing to continue.
                None => set_fatal(&mut parsed.fatal, ErrorCode::InvalidHeaderNameCharacter),
            }
        } else {
            logical.push(Span::new(line.start, end));
        }
    }
    if folded && !policy.allow_obs_fold_in_header {
        set_fatal(&mut parsed.fatal, ErrorCode::InvalidHeaderFormat);
    }

    let mut te_count = 0u32;
    for content in logical {
        let field = parse_field_line(block, content, !level.is_off());
        let record = HeaderLineRecord { name: field.name, value: field.value };

        if field.missing_colon {
            let code = ErrorCode::HeaderMissingColon;
            parsed.lines.push(LineOutcome { record, emit: false, warning: Some(code) });
            continue;
        }
        match field.error {
            Some(FieldError::EmptyName) => {
                set_fatal(&mut parsed.fatal, ErrorCode::InvalidHeaderFormat);
                parsed.lines.push(LineOutcome { record, emit: true, warning: None });
                continue;
            }
            Some(FieldError::InvalidNameChar) => {
                set_fatal(&mut parsed.fatal, ErrorCode::InvalidHeaderNameCharacter);
                parsed.lines.push(LineOutcome { record, emit: false, warning: None });
                continue;
            }
            None => {}
        }

        scan_invalid_octets(block, field.value, level, &mut parsed.invalid_octets, &mut parsed.fatal);
        parsed.lines.push(LineOutcome { record, emit: true, warning: None });

        let name = field.name.slice(block);
        if name.eq_ignore_ascii_case(b"content-length") {
            match parse_content_length(field.value.slice(block)) {
                Some(length) => match parsed.content_length {
                    Some(previous) if previous != length => {
                        set_fatal(&mut parsed.fatal, ErrorCode::MultipleContentLengthKeys);
                    }
                    _ => parsed.content_length = Some(length),
                },
                None => set_fatal(&mut parsed.fatal, ErrorCode::UnparsableContentLength),
            }
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            te_count += 1;
            if te_count > 1 {
                set_fatal(&mut parsed.fatal, ErrorCode::MultipleTransferEncodingKeys);
            } else {
                let value = field.value.slice(block);
                if value.eq_ignore_ascii_case(b"chunked") {
                    parsed.te_chunked = true;
                } else if value.eq_ignore_ascii_case(b"identity") {
                    // As if absent.
                } else if !policy.accept_unknown_te {
                    set_fatal(&mut parsed.fatal, ErrorCode::UnknownTransferEncoding);
                }
            }
        }
    }

    parsed
}

/// Non-negative decimal, no sign, fits in a u64.
fn parse_content_length(value: &[u8]) -> Option<u64> {
    if value.is_empty() {
        return None;
    }
    let mut length: u64 = 0;
    for &b in value {
        if !b.is_ascii_digit() {
            return None;
        }
        length = length.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
    }
    Some(length)
}

struct ParsedTrailer {
    lines: Vec<LineOutcome>,
    fatal: Option<ErrorCode>,
    invalid_octets: Vec<u8>,
}

fn parse_trailer_block(block: &[u8], level: InvalidCharsLevel) -> ParsedTrailer {
    let mut physical = split_physical_lines(block);
    if let Some(last) = physical.last() {
        if content_end(block, *last) == last.start {
            physical.pop();
        }
    }

    let mut parsed =
        ParsedTrailer { lines: Vec::new(), fatal: None, invalid_octets: Vec::new() };

    for line in physical {
        let end = content_end(block, line);
        if end == line.start {
            continue;
        }
        if is_lws(block[line.start]) {
            // Trailers never accept obs-fold.
            set_fatal(&mut parsed.fatal, ErrorCode::InvalidTrailerNameCharacter);
            continue;
        }
        let field = parse_field_line(block, Span::new(line.start, end), !level.is_off());
        let record = HeaderLineRecord { name: field.name, value: field.value };

        if field.missing_colon {
            parsed.lines.push(LineOutcome {
                record,
                emit: false,
                warning: Some(ErrorCode::TrailerMissingColon),
            });
            continue;
        }
        match field.error {
            Some(FieldError::EmptyName) => {
                set_fatal(&mut parsed.fatal, ErrorCode::InvalidTrailerFormat);
                parsed.lines.push(LineOutcome { record, emit: true, warning: None });
            }
            Some(FieldError::InvalidNameChar) => {
                set_fatal(&mut parsed.fatal, ErrorCode::InvalidTrailerNameCharacter);
                parsed.lines.push(LineOutcome { record, emit: false, warning: None });
            }
            None => {
                scan_invalid_octets(
                    block,
                    field.value,
                    level,
                    &mut parsed.invalid_octets,
                    &mut parsed.fatal,
                );
                parsed.lines.push(LineOutcome { record, emit: true, warning: None });
            }
        }
    }

    parsed
}

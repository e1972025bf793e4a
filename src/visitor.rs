use crate::error::ErrorCode;
use crate::headers::HeaderStore;

/// Event sink for the framer.
///
/// Every hook has a no-op default so partial visitors compose cleanly; a
/// consumer implements only what it cares about. For a well-formed message
/// the framer delivers, in order: one first-line event, `on_header` per
/// field, `on_header_input` with the raw block, `process_headers`,
/// `header_done`, body events, trailer events, `message_done`.
///
/// Raw-input hooks (`on_header_input`, `on_raw_body_input`,
/// `on_trailer_input`, `on_chunk_extension_input`) may deliver their bytes
/// in fragments when the caller feeds the framer in small pieces; the
/// concatenation is always the full region.
#[allow(unused_variables)]
pub trait Visitor {
    fn on_request_first_line(&mut self, line: &[u8], method: &[u8], uri: &[u8], version: &[u8]) {}

    fn on_response_first_line(&mut self, line: &[u8], version: &[u8], status: &[u8], reason: &[u8]) {}

    /// One parsed field line. Fired for header and trailer fields alike,
    /// as they are parsed.
    fn on_header(&mut self, name: &[u8], value: &[u8]) {}

    /// The entire raw header block, terminator included.
    fn on_header_input(&mut self, input: &[u8]) {}

    /// Batched view of the parsed header block.
    fn process_headers(&mut self, headers: &HeaderStore) {}

    fn header_done(&mut self) {}

    /// Parsed view of a 1xx prelude, right before `continue_header_done`.
    fn on_interim_headers(&mut self, headers: &HeaderStore) {}

    fn continue_header_done(&mut self) {}

    /// Every body byte as it crossed the wire, chunk framing included.
    fn on_raw_body_input(&mut self, input: &[u8]) {}

    /// Decoded body bytes only.
    fn on_body_chunk_input(&mut self, input: &[u8]) {}

    fn on_chunk_length(&mut self, length: u64) {}

    /// Bytes between a chunk-size token and its line terminator, delimiter
    /// included; empty when the chunk header carries no extension.
    fn on_chunk_extension_input(&mut self, input: &[u8]) {}

    /// Raw trailer bytes as consumed.
    fn on_trailer_input(&mut self, input: &[u8]) {}

    /// Batched view of the parsed trailer. Not fired when no trailer store
    /// is attached.
    fn process_trailers(&mut self, trailer: &HeaderStore) {}

    fn message_done(&mut self) {}

    fn handle_error(&mut self, code: ErrorCode) {}

    fn handle_warning(&mut self, code: ErrorCode) {}
}

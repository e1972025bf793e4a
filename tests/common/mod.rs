//! Shared test plumbing: a recording visitor and feed helpers.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use balsa::{ErrorCode, Framer, HeaderStore, Visitor};

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn pairs(store: &HeaderStore) -> Vec<(String, String)> {
    store.lines().map(|(n, v)| (lossy(n), lossy(v))).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RequestFirstLine { line: String, method: String, uri: String, version: String },
    ResponseFirstLine { line: String, version: String, status: String, reason: String },
    Header { name: String, value: String },
    HeaderInput(String),
    ProcessHeaders(Vec<(String, String)>),
    HeaderDone,
    InterimHeaders(Vec<(String, String)>),
    ContinueHeaderDone,
    RawBody(String),
    BodyChunk(String),
    ChunkLength(u64),
    ChunkExtension(String),
    TrailerInput(String),
    ProcessTrailers(Vec<(String, String)>),
    MessageDone,
    Error(ErrorCode),
    Warning(ErrorCode),
}

/// Clonable visitor that appends every callback to a shared log.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, matcher: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matcher(e)).count()
    }

    /// Concatenation of one fragmenting event kind, for split-insensitive
    /// comparisons.
    pub fn concat(&self, extract: impl Fn(&Event) -> Option<&str>) -> String {
        self.events.borrow().iter().filter_map(|e| extract(e).map(str::to_owned)).collect()
    }

    pub fn raw_body(&self) -> String {
        self.concat(|e| match e {
            Event::RawBody(s) => Some(s),
            _ => None,
        })
    }

    pub fn body_data(&self) -> String {
        self.concat(|e| match e {
            Event::BodyChunk(s) => Some(s),
            _ => None,
        })
    }

    pub fn trailer_input(&self) -> String {
        self.concat(|e| match e {
            Event::TrailerInput(s) => Some(s),
            _ => None,
        })
    }

    /// Everything except the fragmenting raw-input kinds, in order.
    pub fn framing_events(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|e| {
                !matches!(
                    e,
                    Event::RawBody(_)
                        | Event::BodyChunk(_)
                        | Event::TrailerInput(_)
                        | Event::ChunkExtension(_)
                )
            })
            .cloned()
            .collect()
    }
}

impl Visitor for Recorder {
    fn on_request_first_line(&mut self, line: &[u8], method: &[u8], uri: &[u8], version: &[u8]) {
        self.events.borrow_mut().push(Event::RequestFirstLine {
            line: lossy(line),
            method: lossy(method),
            uri: lossy(uri),
            version: lossy(version),
        });
    }

    fn on_response_first_line(&mut self, line: &[u8], version: &[u8], status: &[u8], reason: &[u8]) {
        self.events.borrow_mut().push(Event::ResponseFirstLine {
            line: lossy(line),
            version: lossy(version),
            status: lossy(status),
            reason: lossy(reason),
        });
    }

    fn on_header(&mut self, name: &[u8], value: &[u8]) {
        self.events.borrow_mut().push(Event::Header { name: lossy(name), value: lossy(value) });
    }

    fn on_header_input(&mut self, input: &[u8]) {
        self.events.borrow_mut().push(Event::HeaderInput(lossy(input)));
    }

    fn process_headers(&mut self, headers: &HeaderStore) {
        self.events.borrow_mut().push(Event::ProcessHeaders(pairs(headers)));
    }

    fn header_done(&mut self) {
        self.events.borrow_mut().push(Event::HeaderDone);
    }

    fn on_interim_headers(&mut self, headers: &HeaderStore) {
        self.events.borrow_mut().push(Event::InterimHeaders(pairs(headers)));
    }

    fn continue_header_done(&mut self) {
        self.events.borrow_mut().push(Event::ContinueHeaderDone);
    }

    fn on_raw_body_input(&mut self, input: &[u8]) {
        self.events.borrow_mut().push(Event::RawBody(lossy(input)));
    }

    fn on_body_chunk_input(&mut self, input: &[u8]) {
        self.events.borrow_mut().push(Event::BodyChunk(lossy(input)));
    }

    fn on_chunk_length(&mut self, length: u64) {
        self.events.borrow_mut().push(Event::ChunkLength(length));
    }

    fn on_chunk_extension_input(&mut self, input: &[u8]) {
        self.events.borrow_mut().push(Event::ChunkExtension(lossy(input)));
    }

    fn on_trailer_input(&mut self, input: &[u8]) {
        self.events.borrow_mut().push(Event::TrailerInput(lossy(input)));
    }

    fn process_trailers(&mut self, trailer: &HeaderStore) {
        self.events.borrow_mut().push(Event::ProcessTrailers(pairs(trailer)));
    }

    fn message_done(&mut self) {
        self.events.borrow_mut().push(Event::MessageDone);
    }

    fn handle_error(&mut self, code: ErrorCode) {
        self.events.borrow_mut().push(Event::Error(code));
    }

    fn handle_warning(&mut self, code: ErrorCode) {
        self.events.borrow_mut().push(Event::Warning(code));
    }
}

/// A framer wired up the way most tests want it: recorder attached,
/// header and trailer stores present.
pub fn recorded_framer(is_request: bool) -> (Framer, Recorder) {
    let mut framer = Framer::new();
    framer.set_is_request(is_request);
    framer.set_trailer_store(Some(HeaderStore::new()));
    let recorder = Recorder::default();
    framer.set_visitor(Some(Box::new(recorder.clone())));
    (framer, recorder)
}

/// Feed until the framer stops making progress; returns total consumed.
pub fn feed_all(framer: &mut Framer, input: &[u8]) -> usize {
    let mut total = 0;
    while total < input.len() {
        let consumed = framer.process_input(&input[total..]);
        if consumed == 0 {
            break;
        }
        total += consumed;
    }
    total
}

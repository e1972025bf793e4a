//! Incremental HTTP/1.x message framer.
//!
//! A single-threaded push parser: the caller feeds arbitrary byte slices
//! to [`Framer::process_input`] and a [`Visitor`] receives the structured
//! events (start line, headers, body data, chunk framing, trailers) in
//! wire order. The framer is lenient where real traffic demands it (bare
//! LF line endings, HTTP/0.9 requests, tab-separated tokens, obs-fold)
//! and strict where smuggling hides (conflicting Content-Length headers,
//! unknown transfer codings, whitespace in field names, chunk-length
//! overflow).
//!
//! ```
//! use balsa::Framer;
//!
//! let mut framer = Framer::new();
//! framer.set_is_request(true);
//! let message = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let consumed = framer.process_input(message);
//! assert_eq!(consumed, message.len());
//! assert!(framer.message_fully_read());
//! assert_eq!(framer.headers().unwrap().get("host"), Some(&b"example.com"[..]));
//! ```

mod chunk;
mod error;
mod firstline;
mod framer;
mod headers;
mod policy;
mod scan;
mod visitor;

pub use error::ErrorCode;
pub use framer::{Framer, ParseState};
pub use headers::HeaderStore;
pub use policy::{HttpValidationPolicy, InvalidCharsLevel};
pub use visitor::Visitor;

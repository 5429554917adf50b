//! Frame encodings
//!
//! Both encodings render the same `AggregateSnapshot`; a client picks one at
//! negotiation time.

mod binary;
mod text;

use bytes::Bytes;
use contracts::{AggregateSnapshot, Encoding};

pub use binary::{decode_binary, render_binary, BinaryFrame, FRAME_LEN, FRAME_MAGIC, FRAME_VERSION};
pub use text::{parse_text, render_text, TextBlock, TextFrame};

/// Render `aggregate` in the requested encoding
pub fn render(aggregate: &AggregateSnapshot, encoding: Encoding) -> Bytes {
    match encoding {
        Encoding::Text => Bytes::from(render_text(aggregate)),
        Encoding::Binary => render_binary(aggregate),
    }
}

//! Incremental decoding of streamed assistant replies.
//!
//! The reply body is a sequence of fragments separated by a blank line, each
//! optionally prefixed with `data:`:
//!
//! ```text
//! data: The invoice\n\ndata:  matches PO-7\n\n
//! ```
//!
//! - `decoder` - splits raw chunks into fragment payloads
//! - `accumulator` - folds payloads into the growing reply text
mod accumulator;
mod decoder;

pub use accumulator::{FoldOutcome, StreamAccumulator, fold_stream};
pub use decoder::{DATA_PREFIX, FRAGMENT_DELIMITER, FragmentDecoder, decode_fragment};

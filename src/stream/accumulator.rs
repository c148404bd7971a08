use super::decoder::FragmentDecoder;
use crate::error::ChatResult;
use futures::{Stream, StreamExt};
use std::ops::ControlFlow;

/// Folds a chunked reply into one growing text buffer.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    decoder: FragmentDecoder,
    text: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        for payload in self.decoder.push(chunk) {
            self.text.push_str(&payload);
        }
    }

    /// Text of every completed fragment.
    pub fn committed(&self) -> &str {
        &self.text
    }

    /// Committed text plus the decided part of the fragment still arriving.
    /// Successive values are prefixes of the final text.
    pub fn rendered(&self) -> String {
        let preview = self.decoder.preview();
        let mut out = String::with_capacity(self.text.len() + preview.len());
        out.push_str(&self.text);
        out.push_str(preview);
        out
    }

    pub fn finish(mut self) -> String {
        if let Some(payload) = self.decoder.finish() {
            self.text.push_str(&payload);
        }
        self.text
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The stream ended; carries the full reply.
    Complete(String),
    /// The consumer asked to stop before the stream ended.
    Stopped,
}

/// Reads `stream` to the end, calling `on_update` with the rendered reply
/// after every chunk. Chunks are handled strictly in arrival order and the
/// next one is not polled until `on_update` returns.
pub async fn fold_stream<S, F>(mut stream: S, mut on_update: F) -> ChatResult<FoldOutcome>
where
    S: Stream<Item = ChatResult<Vec<u8>>> + Unpin,
    F: FnMut(&str) -> ControlFlow<()>,
{
    let mut acc = StreamAccumulator::new();
    while let Some(chunk) = stream.next().await {
        acc.push(&chunk?);
        if on_update(&acc.rendered()).is_break() {
            return Ok(FoldOutcome::Stopped);
        }
    }
    Ok(FoldOutcome::Complete(acc.finish()))
}

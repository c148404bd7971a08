/// Separator between fragments of a streamed reply.
pub const FRAGMENT_DELIMITER: &str = "\n\n";
/// Optional marker in front of a fragment's payload.
pub const DATA_PREFIX: &str = "data:";

/// Strips the `data:` marker and at most one following space. Fragments
/// without the marker are returned verbatim.
pub fn decode_fragment(fragment: &str) -> &str {
    match fragment.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => fragment,
    }
}

/// Splits a chunked reply body into fragment payloads.
///
/// Text is buffered across chunks, so a fragment (or a UTF-8 sequence) cut by
/// a chunk boundary decodes exactly as if it had arrived whole.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    carry: Vec<u8>,
    pending: String,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the non-empty payloads of every fragment it
    /// completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode_utf8(chunk);
        self.pending.push_str(&text);

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.find(FRAGMENT_DELIMITER) {
            let payload = decode_fragment(&self.pending[..pos]);
            if !payload.is_empty() {
                payloads.push(payload.to_string());
            }
            self.pending.drain(..pos + FRAGMENT_DELIMITER.len());
        }
        payloads
    }

    /// Ends the stream, returning the payload of the unterminated trailing
    /// fragment if there is one.
    pub fn finish(&mut self) -> Option<String> {
        if !self.carry.is_empty() {
            self.carry.clear();
            self.pending.push(char::REPLACEMENT_CHARACTER);
        }
        let pending = std::mem::take(&mut self.pending);
        let payload = decode_fragment(&pending);
        if payload.is_empty() {
            None
        } else {
            Some(payload.to_string())
        }
    }

    /// What the pending partial fragment is known to decode to so far.
    ///
    /// Always a prefix of the payload the fragment eventually yields: text
    /// that may still turn into the `data:` marker, and a trailing newline
    /// that may still turn into a delimiter, are held back.
    pub fn preview(&self) -> &str {
        let pending = self.pending.strip_suffix('\n').unwrap_or(&self.pending);
        if DATA_PREFIX.starts_with(pending) {
            return "";
        }
        decode_fragment(pending)
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk.
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

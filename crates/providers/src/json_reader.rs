//! Incremental JSON object reader for chunked response bodies.
//!
//! Vendors frame their streams differently: Gemini sends one big JSON array
//! of objects, OpenAI and Claude send SSE `data: {...}` lines. The reader
//! ignores framing and yields each top-level `{...}` object as soon as its
//! closing brace arrives, however the bytes were split across chunks.

use monadic_core::TurnError;
use serde_json::Value;
use tracing::trace;

/// Brace-balancing scanner that survives arbitrary chunk boundaries.
///
/// Bytes outside an object (`[`, `,`, `]`, whitespace, `data:` prefixes,
/// `event:` lines, `[DONE]`) are skipped. Braces inside string literals,
/// including escaped quotes, do not count.
#[derive(Debug, Default)]
pub struct IncrementalJsonReader {
    pending: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    yielded: usize,
}

impl IncrementalJsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every object completed by it, in order.
    ///
    /// A balanced object that is not valid JSON fails the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, TurnError> {
        let mut complete = Vec::new();

        for &byte in chunk {
            if self.depth == 0 {
                if byte != b'{' {
                    continue;
                }
                self.pending.clear();
            }
            self.pending.push(byte);

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        let parsed = serde_json::from_slice::<Value>(&self.pending);
                        let bytes = self.pending.len();
                        self.pending.clear();
                        let value = parsed.map_err(|e| {
                            TurnError::Parse(format!("malformed stream object ({bytes} bytes): {e}"))
                        })?;
                        self.yielded += 1;
                        complete.push(value);
                    }
                }
                _ => {}
            }
        }

        trace!(objects = complete.len(), "Decoded stream chunk");
        Ok(complete)
    }

    /// Whether an object has started but not yet closed.
    pub fn has_partial(&self) -> bool {
        self.depth > 0
    }

    /// Number of objects yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Check the end of the stream. A dangling partial object is an error.
    pub fn finish(&mut self) -> Result<(), TurnError> {
        if self.has_partial() {
            let pending = self.pending.len();
            self.pending.clear();
            self.depth = 0;
            self.in_string = false;
            self.escaped = false;
            return Err(TurnError::Parse(format!(
                "stream ended inside a JSON object ({pending} bytes unconsumed)"
            )));
        }
        Ok(())
    }
}

//! Line framing used by the CMake server on stdio.
//!
//! Every message travels as three or more lines:
//! ```text
//! [== "CMake Server" ==[
//! <json payload>
//! ]== "CMake Server" ==]
//! ```

use serde_json::Value;

use crate::errors::ProtocolError;

/// Line opening a framed message.
pub const START_MARKER: &str = "[== \"CMake Server\" ==[";

/// Line closing a framed message.
pub const END_MARKER: &str = "]== \"CMake Server\" ==]";

/// Serialises `value` and wraps it between the start and end marker lines.
///
/// # Errors
///
/// Returns the serialisation error if `value` cannot be rendered as JSON.
pub fn encode_frame(value: &Value) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(value)?;
    Ok(format!("{START_MARKER}\n{payload}\n{END_MARKER}\n"))
}

/// Accumulates received lines into framed JSON documents.
///
/// A start marker discards whatever was buffered, an end marker parses the
/// buffer, and any other line is appended. Lines seen outside a start/end
/// pair are buffered too, so a stray line before the next start marker is
/// dropped by that marker. Consecutive payload lines are joined with `\n`,
/// which keeps multi-line JSON intact.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (with or without its line terminator).
    ///
    /// Returns `Some` when the line closes a frame.
    pub fn push_line(&mut self, raw: &str) -> Option<Result<Value, ProtocolError>> {
        let line = raw.trim_end_matches(['\n', '\r']);
        if line == START_MARKER {
            self.buffer.clear();
            return None;
        }
        if line == END_MARKER {
            let payload = std::mem::take(&mut self.buffer);
            return Some(serde_json::from_str(&payload).map_err(ProtocolError::InvalidJson));
        }
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        None
    }

    /// Whether a partial payload is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }
}

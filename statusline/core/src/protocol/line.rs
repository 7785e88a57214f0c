//! Line Codec
//!
//! The i3bar stream is newline-delimited. After the two-line preamble each
//! input line is one cycle. A leading `,` marks "not the first array in the
//! stream"; it is stripped on input and re-applied to the matching output
//! line.
//!
//! ```text
//! input:   ,[{"full_text":"W: up"}]
//! output:  ,[{"full_text":"12:00"},{"full_text":"W: up"}]
//! ```

use crate::aggregator::Block;

/// Marker prefixed to every array after the first
pub const CONTINUATION_MARKER: char = ',';

/// A decoded steady-state input line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputLine<'a> {
    /// Whether the line carried the continuation marker
    pub continuation: bool,
    /// Line content with the marker and surrounding whitespace removed
    pub body: &'a str,
}

impl<'a> InputLine<'a> {
    /// Decode a raw line
    ///
    /// Returns `None` when the line is empty after trimming, which is the
    /// host's termination signal.
    #[must_use]
    pub fn decode(raw: &'a str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let (continuation, body) = match trimmed.strip_prefix(CONTINUATION_MARKER) {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        Some(Self { continuation, body })
    }

    /// Output prefix matching this line
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        if self.continuation {
            ","
        } else {
            ""
        }
    }

    /// Blocks carried by the line, if its body is a JSON array
    ///
    /// Anything else (a bare `{}` tick, garbage) carries no blocks.
    #[must_use]
    pub fn upstream_blocks(&self) -> Vec<serde_json::Value> {
        serde_json::from_str::<Vec<serde_json::Value>>(self.body).unwrap_or_default()
    }
}

/// Encode one output line, including the trailing newline
///
/// # Errors
///
/// Returns an error if a block fails to serialize.
pub fn encode_line(continuation: bool, blocks: &[Block]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(blocks)?;
    let mut line = String::with_capacity(json.len() + 2);
    if continuation {
        line.push(CONTINUATION_MARKER);
    }
    line.push_str(&json);
    line.push('\n');
    Ok(line)
}

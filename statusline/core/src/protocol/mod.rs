//! i3bar Line Protocol
//!
//! - `line`: decoding input lines and encoding output lines
//! - `engine`: the handshake and steady-state run loop

pub mod engine;
pub mod line;

pub use engine::{EngineConfig, ProtocolEngine};
pub use line::{encode_line, InputLine, CONTINUATION_MARKER};

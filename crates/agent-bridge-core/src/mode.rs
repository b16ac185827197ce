//! Streaming mode and the process-wide switch that holds it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the HTTP response for a proxied request is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    /// Forward every chunk as soon as it arrives.
    Real,
    /// Buffer the complete answer, emitting keep-alive frames meanwhile.
    #[default]
    Fake,
}

impl StreamingMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Fake => "fake",
        }
    }

    const fn to_bits(self) -> u8 {
        match self {
            Self::Real => 1,
            Self::Fake => 0,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        if bits == 1 { Self::Real } else { Self::Fake }
    }
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected streaming-mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mode {0:?}, use \"fake\" or \"real\"")]
pub struct InvalidMode(pub String);

impl FromStr for StreamingMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(Self::Real),
            "fake" => Ok(Self::Fake),
            other => Err(InvalidMode(other.to_string())),
        }
    }
}

/// Mutable, shareable holder of the current [`StreamingMode`].
///
/// Requests read the mode once at admission and carry it in their
/// [`WireRequest`](crate::wire::WireRequest); switching only affects
/// requests admitted afterwards.
#[derive(Debug)]
pub struct ModeSwitch {
    bits: AtomicU8,
}

impl ModeSwitch {
    #[must_use]
    pub const fn new(initial: StreamingMode) -> Self {
        Self {
            bits: AtomicU8::new(initial.to_bits()),
        }
    }

    /// Current mode.
    pub fn get(&self) -> StreamingMode {
        StreamingMode::from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// Replace the mode, returning the previous one.
    pub fn set(&self, mode: StreamingMode) -> StreamingMode {
        StreamingMode::from_bits(self.bits.swap(mode.to_bits(), Ordering::SeqCst))
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new(StreamingMode::default())
    }
}

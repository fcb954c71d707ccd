// types.rs - Core types and constants for the sound source mixer

//! Core types and constants for the sound source mixer.
//!
//! This module defines the fixed-point limits, the sound type categories used
//! for master gain lookup, and the auto-remove actions a finished source
//! reports to its owner.

use std::fmt;
use std::str::FromStr;

/// Length of the ring buffer that adapts a stream for mixing, in milliseconds
pub const STREAM_BUFFER_LENGTH: u32 = 100;

/// Extra sample frames pulled from a stream on every mix call
pub const STREAM_SAFETY_SAMPLES: usize = 4;

/// Highest playback frequency the 16-bit fixed-point step can represent
pub const MAX_FREQUENCY: f32 = 535232.0;

/// One whole sample in fixed-point fractional position units
pub const FRACT_ONE: u32 = 65536;

/// Mask of the fractional part of a fixed-point position
pub const FRACT_MASK: u32 = FRACT_ONE - 1;

/// Sound type names used for master gain lookup
pub const SOUND_MASTER: &str = "Master";
pub const SOUND_EFFECT: &str = "Effect";
pub const SOUND_AMBIENT: &str = "Ambient";
pub const SOUND_VOICE: &str = "Voice";
pub const SOUND_MUSIC: &str = "Music";

/// All built-in sound types
pub const SOUND_TYPES: [&str; 5] = [
    SOUND_MASTER,
    SOUND_EFFECT,
    SOUND_AMBIENT,
    SOUND_VOICE,
    SOUND_MUSIC,
];

/// Action taken by the owner when playback finishes naturally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoRemoveMode {
    /// Keep everything
    #[default]
    Disabled,
    /// Remove the sound source itself
    RemoveSelf,
    /// Remove the entity owning the source
    RemoveOwner,
}

impl AutoRemoveMode {
    /// Name as shown by attribute editors
    pub fn name(self) -> &'static str {
        match self {
            AutoRemoveMode::Disabled => "Disabled",
            AutoRemoveMode::RemoveSelf => "Component",
            AutoRemoveMode::RemoveOwner => "Node",
        }
    }
}

impl fmt::Display for AutoRemoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AutoRemoveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disabled" => Ok(AutoRemoveMode::Disabled),
            "Component" => Ok(AutoRemoveMode::RemoveSelf),
            "Node" => Ok(AutoRemoveMode::RemoveOwner),
            other => Err(format!("unknown auto remove mode '{}'", other)),
        }
    }
}

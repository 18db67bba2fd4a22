// Pattern module - Step grid data model and its edit-time surface
// Grid mutation happens on the edit thread only; the playback path reads
// immutable CachedPattern snapshots built from these types.

pub mod cache;
pub mod channel;
pub mod grid;
pub mod sequence;

pub use cache::CachedPattern;
pub use channel::{Channel, GrooveSettings, GrooveTemplate};
pub use grid::{Pattern, ShiftDirection, StepValue};
pub use sequence::{PatternInstance, PatternSequence, SequenceError};

use thiserror::Error;

/// Edit-time validation errors
/// Every mutation rejects out-of-range input synchronously and leaves the
/// pattern unchanged; nothing malformed ever reaches generation.
#[derive(Debug, Error, PartialEq)]
pub enum PatternError {
    #[error("step count {0} out of range [{min}, {max}]", min = grid::MIN_STEPS, max = grid::MAX_STEPS)]
    StepCountOutOfRange(usize),

    #[error("channel count {0} out of range [{min}, {max}]", min = grid::MIN_CHANNELS, max = grid::MAX_CHANNELS)]
    ChannelCountOutOfRange(usize),

    #[error("channel index {index} out of range (pattern has {count} channels)")]
    ChannelOutOfRange { index: usize, count: usize },

    #[error("step index {index} out of range (pattern has {count} steps)")]
    StepOutOfRange { index: usize, count: usize },

    #[error("velocity {0} out of range 0-127")]
    InvalidVelocity(u8),

    #[error("gate {0} out of range 0.0-1.0")]
    InvalidGate(f64),

    #[error("probability {0} out of range 0.0-1.0")]
    InvalidProbability(f32),

    #[error("tremolo count {0} exceeds maximum {max}", max = grid::MAX_TREMOLO)]
    InvalidTremolo(u8),

    #[error("interval must be at least 1")]
    InvalidInterval,

    #[error("step length must be a positive number of beats")]
    InvalidStepLength,
}

// GridSeq - Step sequencer pattern model and real-time rendering pipeline

pub mod clip;
pub mod generator;
pub mod midi;
pub mod node;
pub mod pattern;
pub mod playhead;
pub mod snapshot;
pub mod timeline;

// Re-export commonly used types for convenience
pub use clip::{ClipError, StepClip};
pub use generator::{EventSequence, GeneratedEvent, SequenceGenerator, TimeBase};
pub use midi::{MidiBuffer, MidiEvent, MidiEventTimed};
pub use node::{
    AudioBlock, BlockContext, Modifier, ModifierNode, MuteState, Node, OutputProfile,
    RenderContext, SequencePlayerNode,
};
pub use pattern::{
    CachedPattern, Channel, GrooveSettings, GrooveTemplate, Pattern, PatternError,
    PatternInstance, PatternSequence, ShiftDirection, StepValue,
};
pub use playhead::PlayHead;
pub use snapshot::{
    PlaybackSnapshot, SnapshotPublisher, SnapshotReceiver, create_snapshot_channel,
    rebuild_if_dirty,
};
pub use timeline::{Tempo, TimeSignature};

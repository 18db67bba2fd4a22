// ModifierNode - Wraps one opaque signal-processing modifier around an
// upstream node, applying mute/bypass policy and merging MIDI

use super::{AudioBlock, BlockContext, Node, OutputProfile};
use crate::midi::MidiBuffer;
use crate::playhead::PlayHead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-block MIDI event headroom for the merge buffer
const MIDI_MERGE_CAPACITY: usize = 256;

/// Everything a modifier sees for one block
pub struct RenderContext<'a> {
    pub audio: &'a mut AudioBlock,
    pub midi: &'a mut MidiBuffer,
    /// Absolute timeline position of the block's first sample, in seconds
    pub timeline_seconds: f64,
    pub is_playing: bool,
}

/// An opaque buffer-transforming collaborator
///
/// `initialize` and `deinitialize` are paired exactly once per node
/// lifetime; [`ModifierNode`] guarantees the deinitialize on drop once
/// initialize has run. The DSP inside `apply` is not this crate's
/// concern.
pub trait Modifier: Send {
    fn initialize(&mut self, sample_rate: f64, max_block_size: usize);

    /// Transform the block's audio and/or MIDI in place
    fn apply(&mut self, context: &mut RenderContext<'_>);

    fn deinitialize(&mut self);

    /// The modifier's own enabled parameter, polled every block
    fn is_enabled(&self) -> bool {
        true
    }

    /// Audio channels the modifier wants to see (0 for MIDI-only)
    fn audio_channel_count(&self) -> usize {
        2
    }

    /// Whether the modifier consumes or produces MIDI
    fn wants_midi(&self) -> bool {
        false
    }
}

/// Shared "should this branch be audible" collaborator
///
/// The edge signal is latched on the muting transition and consumed by
/// the single node polling it each block.
#[derive(Debug, Default)]
pub struct MuteState {
    audible: AtomicBool,
    just_muted: AtomicBool,
}

impl MuteState {
    pub fn new(audible: bool) -> Arc<Self> {
        Arc::new(Self {
            audible: AtomicBool::new(audible),
            just_muted: AtomicBool::new(false),
        })
    }

    pub fn should_be_audible(&self) -> bool {
        self.audible.load(Ordering::Relaxed)
    }

    pub fn set_audible(&self, audible: bool) {
        let was = self.audible.swap(audible, Ordering::Relaxed);
        if was && !audible {
            self.just_muted.store(true, Ordering::Relaxed);
        }
    }

    /// The muted-this-block edge; reading consumes it
    pub fn take_just_muted(&self) -> bool {
        self.just_muted.swap(false, Ordering::Relaxed)
    }
}

/// Runs an upstream node, then applies one modifier to the result
///
/// Audio is copied across the overlapping channels, upstream MIDI is
/// merged, and the modifier only runs when both its own enabled flag and
/// the mute collaborator allow it. Jump and mute edges mark the merge
/// buffer all-notes-off so downstream consumers release sustained notes.
pub struct ModifierNode {
    input: Box<dyn Node>,
    modifier: Box<dyn Modifier>,
    mute_state: Option<Arc<MuteState>>,
    playhead: Arc<PlayHead>,
    input_audio: AudioBlock,
    input_midi: MidiBuffer,
    merge_midi: MidiBuffer,
    sample_rate: f64,
    initialized: bool,
}

impl ModifierNode {
    pub fn new(
        input: Box<dyn Node>,
        modifier: Box<dyn Modifier>,
        playhead: Arc<PlayHead>,
        mute_state: Option<Arc<MuteState>>,
    ) -> Self {
        let input_channels = input.output_profile().channel_count;
        Self {
            input,
            modifier,
            mute_state,
            playhead,
            input_audio: AudioBlock::new(input_channels, 0),
            input_midi: MidiBuffer::with_capacity(MIDI_MERGE_CAPACITY),
            merge_midi: MidiBuffer::with_capacity(MIDI_MERGE_CAPACITY),
            sample_rate: 0.0,
            initialized: false,
        }
    }
}

impl Node for ModifierNode {
    fn output_profile(&self) -> OutputProfile {
        let input = self.input.output_profile();
        let modifier_channels = self.modifier.audio_channel_count();
        OutputProfile {
            channel_count: input.channel_count.max(modifier_channels),
            has_audio: input.has_audio || modifier_channels > 0,
            has_midi: input.has_midi || self.modifier.wants_midi(),
        }
    }

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.input.prepare(sample_rate, max_block_size);

        let input_channels = self.input.output_profile().channel_count;
        self.input_audio = AudioBlock::new(input_channels, max_block_size);

        if self.initialized {
            // Re-preparing at a new rate would need a deinit/init cycle
            // the contract does not allow; hosts must not do this
            debug_assert!(
                sample_rate == self.sample_rate,
                "sample rate changed after initialization"
            );
        } else {
            self.modifier.initialize(sample_rate, max_block_size);
            self.initialized = true;
        }
        self.sample_rate = sample_rate;
    }

    fn is_ready_to_process(&self) -> bool {
        self.input.is_ready_to_process()
    }

    fn process(&mut self, context: &mut BlockContext<'_>) {
        debug_assert!(self.initialized, "process called before prepare");
        debug_assert!(self.is_ready_to_process(), "process called while not ready");
        if !self.initialized || !self.is_ready_to_process() {
            context.audio.clear();
            context.midi.clear();
            return;
        }

        // Run the upstream node into our scratch buffers
        self.input_audio.set_block_size(context.num_samples);
        self.input_audio.clear();
        self.input_midi.clear();
        {
            let mut upstream = BlockContext {
                audio: &mut self.input_audio,
                midi: &mut self.input_midi,
                reference_sample: context.reference_sample,
                num_samples: context.num_samples,
            };
            self.input.process(&mut upstream);
        }

        // Copy the overlapping audio channels, then merge the MIDI
        context.audio.clear();
        context.audio.copy_from(&self.input_audio);
        self.merge_midi.copy_from(&self.input_midi);

        let mut enabled = self.modifier.is_enabled();

        if self.playhead.did_jump_this_block() {
            self.merge_midi.all_notes_off = true;
        }

        if let Some(mute) = &self.mute_state {
            if !mute.should_be_audible() {
                enabled = false;
            }
            if mute.take_just_muted() {
                self.merge_midi.all_notes_off = true;
            }
        }

        if enabled {
            let mut render = RenderContext {
                audio: context.audio,
                midi: &mut self.merge_midi,
                timeline_seconds: context.reference_sample as f64 / self.sample_rate,
                is_playing: self.playhead.is_playing(),
            };
            self.modifier.apply(&mut render);
        }

        context.midi.copy_from(&self.merge_midi);
    }
}

impl Drop for ModifierNode {
    fn drop(&mut self) {
        if self.initialized {
            self.modifier.deinitialize();
        }
    }
}

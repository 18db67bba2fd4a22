// Node - Real-time processing units and their block context
// Nodes are prepared once before playback and then asked to fill one
// output buffer per block, in upstream-to-downstream order on a single
// rendering thread

pub mod modifier;
pub mod player;

pub use modifier::{Modifier, ModifierNode, MuteState, RenderContext};
pub use player::SequencePlayerNode;

use crate::midi::MidiBuffer;

/// Shape of the output a node produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputProfile {
    pub channel_count: usize,
    pub has_audio: bool,
    pub has_midi: bool,
}

/// Planar audio buffer, allocated once in `prepare`
///
/// `set_block_size` trims the view to the current block without touching
/// capacity, so `process` never reallocates.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    channels: Vec<Vec<f32>>,
    max_block_size: usize,
    num_samples: usize,
}

impl AudioBlock {
    pub fn new(num_channels: usize, max_block_size: usize) -> Self {
        Self {
            channels: vec![vec![0.0; max_block_size]; num_channels],
            max_block_size,
            num_samples: max_block_size,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Prepared capacity; independent of channel count so a MIDI-only
    /// block (zero channels) still carries its block size
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Set the active block length; must not exceed the prepared size
    pub fn set_block_size(&mut self, num_samples: usize) {
        debug_assert!(num_samples <= self.max_block_size());
        self.num_samples = num_samples.min(self.max_block_size());
    }

    pub fn samples(&self, channel: usize) -> &[f32] {
        &self.channels[channel][..self.num_samples]
    }

    pub fn samples_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.channels[channel][..self.num_samples]
    }

    /// Zero the active block on every channel
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel[..self.num_samples].iter_mut().for_each(|s| *s = 0.0);
        }
    }

    /// Copy the overlapping channels from another block
    /// Channels beyond the source keep their current contents
    pub fn copy_from(&mut self, source: &AudioBlock) {
        let channels = self.channels.len().min(source.channels.len());
        let samples = self.num_samples.min(source.num_samples);
        for c in 0..channels {
            self.channels[c][..samples].copy_from_slice(&source.channels[c][..samples]);
        }
    }
}

/// Everything a node needs to render one block
pub struct BlockContext<'a> {
    pub audio: &'a mut AudioBlock,
    pub midi: &'a mut MidiBuffer,
    /// Absolute timeline position of the block's first sample
    pub reference_sample: u64,
    pub num_samples: usize,
}

/// A real-time processing unit
///
/// `process` must be real-time safe: no allocation, no blocking, bounded
/// work proportional to the block size. Hosts must not call it while
/// `is_ready_to_process` is false; if they do anyway the node outputs
/// silence rather than faulting.
pub trait Node: Send {
    /// The audio/MIDI shape this node produces
    fn output_profile(&self) -> OutputProfile;

    /// Called once before playback starts, and again on sample-rate or
    /// block-size changes
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize);

    /// False while any upstream asynchronous preparation is pending
    fn is_ready_to_process(&self) -> bool {
        true
    }

    /// Fill the output buffers for one block
    fn process(&mut self, context: &mut BlockContext<'_>);
}

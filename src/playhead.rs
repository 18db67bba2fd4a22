// PlayHead - Shared playback position and jump notification
// Thread-safe via atomics for communication with the audio thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared playhead state
///
/// The edit/UI side controls play state and position; the rendering side
/// reads the position once per block. Discontinuities (seek, loop wrap)
/// raise a jump flag which the host latches at the start of each block so
/// every node in the graph observes the same decision.
#[derive(Debug)]
pub struct PlayHead {
    playing: AtomicBool,
    position_samples: AtomicU64,
    loop_enabled: AtomicBool,
    loop_start_samples: AtomicU64,
    loop_end_samples: AtomicU64,
    jumped: AtomicBool,
    jumped_this_block: AtomicBool,
}

impl PlayHead {
    /// Create new shared playhead
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Check if transport is playing
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Start playback from the current position
    pub fn play(&self) {
        self.playing.store(true, Ordering::Relaxed);
    }

    /// Stop playback, keeping the current position
    pub fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    /// Get current position in samples
    pub fn position_samples(&self) -> u64 {
        self.position_samples.load(Ordering::Relaxed)
    }

    /// Seek to an absolute sample position
    /// Raises the jump flag so nodes release sustained notes
    pub fn set_position_samples(&self, samples: u64) {
        self.position_samples.store(samples, Ordering::Relaxed);
        self.jumped.store(true, Ordering::Relaxed);
    }

    /// Advance position by one block
    /// Returns the new position; wrapping the loop region counts as a jump
    pub fn advance(&self, delta_samples: u64) -> u64 {
        let current = self.position_samples.load(Ordering::Relaxed);
        let mut new_pos = current + delta_samples;

        if self.loop_enabled.load(Ordering::Relaxed) {
            let loop_start = self.loop_start_samples.load(Ordering::Relaxed);
            let loop_end = self.loop_end_samples.load(Ordering::Relaxed);

            if loop_end > loop_start && new_pos >= loop_end {
                let loop_length = loop_end - loop_start;
                let overflow = new_pos - loop_end;
                new_pos = loop_start + (overflow % loop_length);
                self.jumped.store(true, Ordering::Relaxed);
            }
        }

        self.position_samples.store(new_pos, Ordering::Relaxed);
        new_pos
    }

    /// Check if loop is enabled
    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    /// Get loop region (start, end) in samples
    pub fn loop_region(&self) -> (u64, u64) {
        (
            self.loop_start_samples.load(Ordering::Relaxed),
            self.loop_end_samples.load(Ordering::Relaxed),
        )
    }

    /// Set loop region
    pub fn set_loop_region(&self, start_samples: u64, end_samples: u64) {
        assert!(end_samples > start_samples, "Loop end must be after start");
        self.loop_start_samples.store(start_samples, Ordering::Relaxed);
        self.loop_end_samples.store(end_samples, Ordering::Relaxed);
    }

    /// Enable/disable looping
    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Latch the pending jump flag for the coming block
    ///
    /// Called once by the host at the start of each audio callback, before
    /// any node processes. All nodes then agree on `did_jump_this_block`.
    pub fn begin_block(&self) {
        let jumped = self.jumped.swap(false, Ordering::Relaxed);
        self.jumped_this_block.store(jumped, Ordering::Relaxed);
    }

    /// Whether a discontinuity occurred since the previous block
    pub fn did_jump_this_block(&self) -> bool {
        self.jumped_this_block.load(Ordering::Relaxed)
    }
}

impl Default for PlayHead {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            position_samples: AtomicU64::new(0),
            loop_enabled: AtomicBool::new(false),
            loop_start_samples: AtomicU64::new(0),
            loop_end_samples: AtomicU64::new(0),
            jumped: AtomicBool::new(false),
            jumped_this_block: AtomicBool::new(false),
        }
    }
}

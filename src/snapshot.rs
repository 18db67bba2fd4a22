// Snapshot publication - Edit-context regeneration, lock-free handoff
// The playback context only ever sees complete, immutable snapshots

use crate::clip::StepClip;
use crate::generator::{EventSequence, SequenceGenerator, TimeBase};
use crate::pattern::GrooveTemplate;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Producer, Split};
use std::sync::Arc;

/// Immutable, pre-resolved playback material for one clip
///
/// Built entirely in the edit context; the rendering side receives it
/// behind an `Arc` and never mutates it.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    /// Merged event sequence across all channels, in beats
    pub events: EventSequence,
    /// Clip timeline length in beats
    pub length_beats: f64,
}

impl PlaybackSnapshot {
    /// Generate a snapshot from the clip's current state
    pub fn build(clip: &StepClip, grooves: &[GrooveTemplate], seed: u64) -> Self {
        let generator = SequenceGenerator::new(seed);
        Self {
            events: generator.generate(clip, None, grooves, TimeBase::Beats),
            length_beats: clip.length_beats(),
        }
    }
}

/// Edit-side half of the snapshot channel
pub struct SnapshotPublisher {
    tx: ringbuf::HeapProd<Arc<PlaybackSnapshot>>,
}

/// Playback-side half of the snapshot channel
///
/// Keeps the most recently received snapshot; `latest` drains any queued
/// publications without blocking and is safe to call from the audio
/// callback (popping only moves `Arc`s).
pub struct SnapshotReceiver {
    rx: ringbuf::HeapCons<Arc<PlaybackSnapshot>>,
    current: Option<Arc<PlaybackSnapshot>>,
}

/// Create the SPSC snapshot channel
pub fn create_snapshot_channel(capacity: usize) -> (SnapshotPublisher, SnapshotReceiver) {
    let rb = HeapRb::<Arc<PlaybackSnapshot>>::new(capacity);
    let (tx, rx) = rb.split();
    (SnapshotPublisher { tx }, SnapshotReceiver { rx, current: None })
}

impl SnapshotPublisher {
    /// Publish a finished snapshot; returns false if the channel is full
    /// (the playback side has not drained - retry after the next block)
    pub fn publish(&mut self, snapshot: Arc<PlaybackSnapshot>) -> bool {
        self.tx.try_push(snapshot).is_ok()
    }
}

impl SnapshotReceiver {
    /// The newest published snapshot, if any has arrived yet
    pub fn latest(&mut self) -> Option<&Arc<PlaybackSnapshot>> {
        while let Some(snapshot) = self.rx.try_pop() {
            self.current = Some(snapshot);
        }
        self.current.as_ref()
    }
}

/// Edit-coordinator entry point: rebuild and publish when the clip has
/// pending edits. Called after a batch of mutations, never per keystroke.
///
/// The dirty flag is consumed only on a successful publish; a full
/// channel leaves the clip dirty so the next call retries the rebuild.
pub fn rebuild_if_dirty(
    clip: &mut StepClip,
    grooves: &[GrooveTemplate],
    seed: u64,
    publisher: &mut SnapshotPublisher,
) -> bool {
    if !clip.is_dirty() {
        return false;
    }
    let published = publisher.publish(Arc::new(PlaybackSnapshot::build(clip, grooves, seed)));
    if published {
        clip.take_dirty();
    }
    published
}

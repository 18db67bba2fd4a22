// StepClip - Composition root for the step-sequencer data model
// Owns channels, patterns and the pattern sequence; tracks a dirty flag
// the edit coordinator polls to decide when to rebuild playback snapshots

use crate::pattern::{
    Channel, Pattern, PatternError, PatternInstance, PatternSequence, SequenceError,
};
use crate::pattern::grid::{MAX_CHANNELS, MIN_CHANNELS};
use crate::timeline::TimeSignature;
use thiserror::Error;

pub const DEFAULT_PATTERN_STEPS: usize = 16;

/// Errors from clip-level edit operations
#[derive(Debug, Error, PartialEq)]
pub enum ClipError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("pattern index {index} does not exist (clip has {count} patterns)")]
    UnknownPattern { index: usize, count: usize },
}

/// A step clip: channels, patterns, and the instance sequence
///
/// All mutation happens on the edit thread. Every mutating call marks the
/// clip dirty; there are no change listeners. After a batch of edits the
/// coordinator checks `take_dirty` and rebuilds the playback snapshot.
#[derive(Debug, Clone)]
pub struct StepClip {
    name: String,
    channels: Vec<Channel>,
    patterns: Vec<Pattern>,
    sequence: PatternSequence,
    time_signature: TimeSignature,
    volume_db: f32,
    muted: bool,
    dirty: bool,
}

impl StepClip {
    /// Create an empty clip with the given number of default channels
    pub fn new(name: impl Into<String>, num_channels: usize) -> Result<Self, PatternError> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&num_channels) {
            return Err(PatternError::ChannelCountOutOfRange(num_channels));
        }

        Ok(Self {
            name: name.into(),
            channels: (0..num_channels).map(|_| Channel::default()).collect(),
            patterns: Vec::new(),
            sequence: PatternSequence::new(),
            time_signature: TimeSignature::default(),
            volume_db: 0.0,
            muted: false,
            dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    //==========================================================================
    // Channels

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.dirty = true;
        self.channels.get_mut(index)
    }

    /// Insert a channel, keeping every pattern's lane count in sync
    pub fn insert_channel(&mut self, index: usize, channel: Channel) -> Result<(), PatternError> {
        if self.channels.len() >= MAX_CHANNELS {
            return Err(PatternError::ChannelCountOutOfRange(self.channels.len() + 1));
        }

        let at = index.min(self.channels.len());
        for pattern in &mut self.patterns {
            pattern.insert_channel(at)?;
        }
        self.channels.insert(at, channel);
        self.dirty = true;
        Ok(())
    }

    /// Remove a channel from the clip and every pattern
    pub fn remove_channel(&mut self, index: usize) -> Result<(), PatternError> {
        if index >= self.channels.len() {
            return Err(PatternError::ChannelOutOfRange {
                index,
                count: self.channels.len(),
            });
        }
        if self.channels.len() <= MIN_CHANNELS {
            return Err(PatternError::ChannelCountOutOfRange(self.channels.len() - 1));
        }

        for pattern in &mut self.patterns {
            pattern.remove_channel(index)?;
        }
        self.channels.remove(index);
        self.dirty = true;
        Ok(())
    }

    //==========================================================================
    // Patterns

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    /// Mutable pattern access; marks the clip dirty
    pub fn pattern_mut(&mut self, index: usize) -> Option<&mut Pattern> {
        self.dirty = true;
        self.patterns.get_mut(index)
    }

    /// Add a new empty pattern, returning its index
    pub fn insert_new_pattern(&mut self, num_steps: usize) -> Result<usize, PatternError> {
        let pattern = Pattern::new(num_steps, self.channels.len())?;
        self.patterns.push(pattern);
        self.dirty = true;
        Ok(self.patterns.len() - 1)
    }

    /// Add a clone of an existing pattern, returning its index
    pub fn insert_pattern(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        self.dirty = true;
        self.patterns.len() - 1
    }

    /// Remove a pattern; sequence entries pointing at it are dropped and
    /// later entries are reindexed
    pub fn remove_pattern(&mut self, index: usize) -> Result<(), ClipError> {
        if index >= self.patterns.len() {
            return Err(ClipError::UnknownPattern {
                index,
                count: self.patterns.len(),
            });
        }

        self.patterns.remove(index);

        let entries: Vec<usize> = self.sequence.entries().to_vec();
        self.sequence.clear();
        for entry in entries {
            if entry < index {
                let _ = self.sequence.push(entry, self.patterns.len());
            } else if entry > index {
                let _ = self.sequence.push(entry - 1, self.patterns.len());
            }
        }

        self.dirty = true;
        Ok(())
    }

    /// Drop patterns no sequence entry references
    pub fn remove_unused_patterns(&mut self) {
        let mut index = 0;
        while index < self.patterns.len() {
            if self.sequence.entries().contains(&index) {
                index += 1;
            } else {
                // Ignore the error: index is in range by the loop bound
                let _ = self.remove_pattern(index);
            }
        }
    }

    /// Make sure at least one pattern exists and is sequenced
    pub fn create_default_pattern_if_empty(&mut self) -> Result<(), ClipError> {
        if self.patterns.is_empty() {
            self.insert_new_pattern(DEFAULT_PATTERN_STEPS)?;
        }
        if self.sequence.is_empty() {
            self.sequence.push(0, self.patterns.len())?;
            self.dirty = true;
        }
        Ok(())
    }

    //==========================================================================
    // Cells (pattern index + channel + step addressing)

    pub fn cell(&self, pattern: usize, channel: usize, step: usize) -> Option<bool> {
        self.patterns.get(pattern)?.note(channel, step).value()
    }

    pub fn set_cell(
        &mut self,
        pattern: usize,
        channel: usize,
        step: usize,
        on: bool,
    ) -> Result<(), ClipError> {
        let count = self.patterns.len();
        let p = self
            .patterns
            .get_mut(pattern)
            .ok_or(ClipError::UnknownPattern { index: pattern, count })?;
        p.set_note(channel, step, on)?;
        self.dirty = true;
        Ok(())
    }

    //==========================================================================
    // Sequence

    pub fn sequence(&self) -> &PatternSequence {
        &self.sequence
    }

    /// Append an instance of a pattern to the timeline
    pub fn append_instance(&mut self, pattern_index: usize) -> Result<(), SequenceError> {
        self.sequence.push(pattern_index, self.patterns.len())?;
        self.dirty = true;
        Ok(())
    }

    /// Insert an instance at a sequence position
    pub fn insert_instance(
        &mut self,
        position: usize,
        pattern_index: usize,
    ) -> Result<(), SequenceError> {
        self.sequence
            .insert(position, pattern_index, self.patterns.len())?;
        self.dirty = true;
        Ok(())
    }

    /// Remove the instance at a sequence position
    pub fn remove_instance(&mut self, position: usize) -> Result<(), SequenceError> {
        self.sequence.remove(position)?;
        self.dirty = true;
        Ok(())
    }

    /// Repoint an instance at a different pattern
    pub fn set_instance_pattern(
        &mut self,
        position: usize,
        pattern_index: usize,
    ) -> Result<(), SequenceError> {
        self.sequence
            .set(position, pattern_index, self.patterns.len())?;
        self.dirty = true;
        Ok(())
    }

    /// Resolve the sequence into contiguous beat spans
    pub fn pattern_instances(&self) -> Vec<PatternInstance> {
        self.sequence.resolve(&self.patterns)
    }

    /// Beat span of one instance by sequence position
    pub fn instance_span(&self, position: usize) -> Option<(f64, f64)> {
        self.pattern_instances()
            .get(position)
            .map(|i| (i.start_beat, i.end_beat))
    }

    /// Total clip length in beats
    pub fn length_beats(&self) -> f64 {
        self.sequence.length_beats(&self.patterns)
    }

    //==========================================================================
    // Bar context

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        self.dirty = true;
    }

    /// Total clip length in bars under the clip's time signature
    pub fn length_bars(&self) -> f64 {
        self.length_beats() / self.time_signature.beats_per_bar()
    }

    //==========================================================================
    // Level

    pub fn volume_db(&self) -> f32 {
        self.volume_db
    }

    pub fn set_volume_db(&mut self, db: f32) {
        self.volume_db = db.clamp(-100.0, 0.0);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    //==========================================================================
    // Dirty tracking

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Read and clear the dirty flag; the coordinator calls this after a
    /// batch of edits to decide whether a snapshot rebuild is due
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> StepClip {
        let mut clip = StepClip::new("Drums", 4).unwrap();
        clip.create_default_pattern_if_empty().unwrap();
        clip
    }

    #[test]
    fn test_default_pattern_created_once() {
        let mut clip = clip();
        assert_eq!(clip.num_patterns(), 1);
        assert_eq!(clip.sequence().len(), 1);

        clip.create_default_pattern_if_empty().unwrap();
        assert_eq!(clip.num_patterns(), 1);
        assert_eq!(clip.sequence().len(), 1);
    }

    #[test]
    fn test_channel_count_bounds() {
        assert!(StepClip::new("x", 0).is_err());
        assert!(StepClip::new("x", 61).is_err());
        assert!(StepClip::new("x", 60).is_ok());
    }

    #[test]
    fn test_insert_channel_syncs_patterns() {
        let mut clip = clip();
        clip.insert_channel(2, Channel::new(10, 42)).unwrap();

        assert_eq!(clip.channels().len(), 5);
        assert_eq!(clip.pattern(0).unwrap().num_channels(), 5);
        assert_eq!(clip.channel(2).unwrap().note_number, 42);
    }

    #[test]
    fn test_remove_channel_syncs_patterns() {
        let mut clip = clip();
        clip.remove_channel(1).unwrap();

        assert_eq!(clip.channels().len(), 3);
        assert_eq!(clip.pattern(0).unwrap().num_channels(), 3);
    }

    #[test]
    fn test_edits_mark_dirty() {
        let mut clip = clip();
        assert!(clip.take_dirty());
        assert!(!clip.is_dirty());

        clip.set_cell(0, 0, 3, true).unwrap();
        assert!(clip.take_dirty());

        clip.append_instance(0).unwrap();
        assert!(clip.take_dirty());

        // Rejected edits leave the flag untouched
        assert!(clip.set_cell(5, 0, 0, true).is_err());
        assert!(!clip.is_dirty());
    }

    #[test]
    fn test_remove_pattern_reindexes_sequence() {
        let mut clip = clip();
        let second = clip.insert_new_pattern(8).unwrap();
        let third = clip.insert_new_pattern(32).unwrap();
        clip.append_instance(second).unwrap();
        clip.append_instance(third).unwrap();

        // Sequence: [0, 1, 2]; removing pattern 1 drops its entry and
        // shifts the reference to pattern 2 down
        clip.remove_pattern(second).unwrap();
        assert_eq!(clip.sequence().entries(), &[0, 1]);
        assert_eq!(clip.pattern(1).unwrap().num_steps(), 32);
    }

    #[test]
    fn test_remove_unused_patterns() {
        let mut clip = clip();
        clip.insert_new_pattern(8).unwrap();
        clip.insert_new_pattern(4).unwrap();
        assert_eq!(clip.num_patterns(), 3);

        clip.remove_unused_patterns();
        assert_eq!(clip.num_patterns(), 1);
        assert_eq!(clip.sequence().entries(), &[0]);
    }

    #[test]
    fn test_instance_spans() {
        let mut clip = clip();
        let second = clip.insert_new_pattern(8).unwrap();
        clip.append_instance(second).unwrap();

        // Pattern 0: 16 steps x 1/4 beat = 4 beats; pattern 1: 2 beats
        assert_eq!(clip.instance_span(0), Some((0.0, 4.0)));
        assert_eq!(clip.instance_span(1), Some((4.0, 6.0)));
        assert_eq!(clip.length_beats(), 6.0);
    }

    #[test]
    fn test_length_in_bars_follows_time_signature() {
        // 16 steps of 1/4 beat = 4 beats = one 4/4 bar
        let mut clip = clip();
        assert_eq!(clip.time_signature(), TimeSignature::four_four());
        assert_eq!(clip.length_bars(), 1.0);

        clip.take_dirty();
        clip.set_time_signature(TimeSignature::three_four());
        assert!(clip.take_dirty());
        assert!((clip.length_bars() - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_clamped() {
        let mut clip = clip();
        clip.set_volume_db(12.0);
        assert_eq!(clip.volume_db(), 0.0);
        clip.set_volume_db(-250.0);
        assert_eq!(clip.volume_db(), -100.0);
    }
}

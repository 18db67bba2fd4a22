// PatternSequence - Ordered pattern instances forming the clip timeline
// Beat spans are derived from pattern lengths on resolve, so they are
// contiguous and non-overlapping by construction

use super::grid::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sequence edit errors, rejected synchronously like pattern edits
#[derive(Debug, Error, PartialEq)]
pub enum SequenceError {
    #[error("pattern index {index} does not exist (clip has {count} patterns)")]
    UnknownPattern { index: usize, count: usize },

    #[error("sequence position {position} out of range ({count} entries)")]
    PositionOutOfRange { position: usize, count: usize },
}

/// One placement of a pattern within the playback timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternInstance {
    pub pattern_index: usize,
    pub start_beat: f64,
    pub end_beat: f64,
}

impl PatternInstance {
    pub fn length_beats(&self) -> f64 {
        self.end_beat - self.start_beat
    }
}

/// Ordered list of pattern indices replayed back to back
///
/// Only the indices are stored. Start/end beats are recomputed from the
/// owning clip's patterns every time the list is resolved, so editing a
/// pattern's length or reordering entries automatically moves everything
/// downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSequence {
    entries: Vec<usize>,
}

impl PatternSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    /// Append an instance of a pattern
    pub fn push(&mut self, pattern_index: usize, pattern_count: usize) -> Result<(), SequenceError> {
        self.insert(self.entries.len(), pattern_index, pattern_count)
    }

    /// Insert an instance at a sequence position
    pub fn insert(
        &mut self,
        position: usize,
        pattern_index: usize,
        pattern_count: usize,
    ) -> Result<(), SequenceError> {
        if pattern_index >= pattern_count {
            return Err(SequenceError::UnknownPattern {
                index: pattern_index,
                count: pattern_count,
            });
        }
        if position > self.entries.len() {
            return Err(SequenceError::PositionOutOfRange {
                position,
                count: self.entries.len(),
            });
        }
        self.entries.insert(position, pattern_index);
        Ok(())
    }

    /// Remove the instance at a sequence position, returning its pattern index
    pub fn remove(&mut self, position: usize) -> Result<usize, SequenceError> {
        if position >= self.entries.len() {
            return Err(SequenceError::PositionOutOfRange {
                position,
                count: self.entries.len(),
            });
        }
        Ok(self.entries.remove(position))
    }

    /// Repoint an existing instance at a different pattern
    pub fn set(
        &mut self,
        position: usize,
        pattern_index: usize,
        pattern_count: usize,
    ) -> Result<(), SequenceError> {
        if pattern_index >= pattern_count {
            return Err(SequenceError::UnknownPattern {
                index: pattern_index,
                count: pattern_count,
            });
        }
        match self.entries.get_mut(position) {
            Some(entry) => {
                *entry = pattern_index;
                Ok(())
            }
            None => Err(SequenceError::PositionOutOfRange {
                position,
                count: self.entries.len(),
            }),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolve the entry list into contiguous beat spans
    ///
    /// Entries pointing at a pattern that no longer exists resolve to a
    /// zero-length span rather than failing: generation fails closed.
    pub fn resolve(&self, patterns: &[Pattern]) -> Vec<PatternInstance> {
        let mut instances = Vec::with_capacity(self.entries.len());
        let mut cursor = 0.0;

        for &pattern_index in &self.entries {
            let length = patterns
                .get(pattern_index)
                .map(Pattern::length_beats)
                .unwrap_or(0.0);

            instances.push(PatternInstance {
                pattern_index,
                start_beat: cursor,
                end_beat: cursor + length,
            });
            cursor += length;
        }

        instances
    }

    /// Total sequence length in beats
    pub fn length_beats(&self, patterns: &[Pattern]) -> f64 {
        self.entries
            .iter()
            .map(|&i| patterns.get(i).map(Pattern::length_beats).unwrap_or(0.0))
            .sum()
    }
}

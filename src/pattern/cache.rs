// CachedPattern - Immutable per-channel snapshot of pattern data
// Built in the edit context so the generation path never walks the
// mutable pattern representation; invalid once the source pattern changes

use super::grid::{
    DEFAULT_GATE, DEFAULT_PITCH_OFFSET, DEFAULT_PROBABILITY, DEFAULT_TREMOLO, DEFAULT_VELOCITY,
    Pattern,
};
use super::PatternError;

/// Read-only snapshot of one channel's step data
///
/// Every array is resolved to full `num_steps` length at build time, so
/// reads are branch-light and never consult the sparse representation.
/// Attribute reads on a silent step return `None`; an out-of-range step
/// reads as silent.
#[derive(Debug, Clone)]
pub struct CachedPattern {
    num_steps: usize,
    step_length_beats: f64,
    bits: Vec<bool>,
    velocities: Vec<u8>,
    gates: Vec<f64>,
    probabilities: Vec<f32>,
    pitch_offsets: Vec<i8>,
    tremolos: Vec<u8>,
}

impl CachedPattern {
    /// Snapshot one channel of a pattern
    pub fn for_channel(pattern: &Pattern, channel: usize) -> Result<Self, PatternError> {
        let num_steps = pattern.num_steps();
        if channel >= pattern.num_channels() {
            return Err(PatternError::ChannelOutOfRange {
                index: channel,
                count: pattern.num_channels(),
            });
        }

        let mut cached = Self {
            num_steps,
            step_length_beats: pattern.step_length_beats(),
            bits: Vec::with_capacity(num_steps),
            velocities: Vec::with_capacity(num_steps),
            gates: Vec::with_capacity(num_steps),
            probabilities: Vec::with_capacity(num_steps),
            pitch_offsets: Vec::with_capacity(num_steps),
            tremolos: Vec::with_capacity(num_steps),
        };

        for step in 0..num_steps {
            cached
                .bits
                .push(pattern.note(channel, step).value().unwrap_or(false));
            cached.velocities.push(
                pattern
                    .velocity(channel, step)
                    .resolve(DEFAULT_VELOCITY)
                    .unwrap_or(DEFAULT_VELOCITY),
            );
            cached.gates.push(
                pattern
                    .gate(channel, step)
                    .resolve(DEFAULT_GATE)
                    .unwrap_or(DEFAULT_GATE),
            );
            cached.probabilities.push(
                pattern
                    .probability(channel, step)
                    .resolve(DEFAULT_PROBABILITY)
                    .unwrap_or(DEFAULT_PROBABILITY),
            );
            cached.pitch_offsets.push(
                pattern
                    .pitch_offset(channel, step)
                    .resolve(DEFAULT_PITCH_OFFSET)
                    .unwrap_or(DEFAULT_PITCH_OFFSET),
            );
            cached.tremolos.push(
                pattern
                    .tremolo(channel, step)
                    .resolve(DEFAULT_TREMOLO)
                    .unwrap_or(DEFAULT_TREMOLO),
            );
        }

        Ok(cached)
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn step_length_beats(&self) -> f64 {
        self.step_length_beats
    }

    pub fn note(&self, step: usize) -> bool {
        self.bits.get(step).copied().unwrap_or(false)
    }

    pub fn velocity(&self, step: usize) -> Option<u8> {
        self.note(step).then(|| self.velocities[step])
    }

    pub fn gate(&self, step: usize) -> Option<f64> {
        self.note(step).then(|| self.gates[step])
    }

    pub fn probability(&self, step: usize) -> Option<f32> {
        self.note(step).then(|| self.probabilities[step])
    }

    pub fn pitch_offset(&self, step: usize) -> Option<i8> {
        self.note(step).then(|| self.pitch_offsets[step])
    }

    pub fn tremolo(&self, step: usize) -> Option<u8> {
        self.note(step).then(|| self.tremolos[step])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_resolves_defaults() {
        let mut pattern = Pattern::new(8, 2).unwrap();
        pattern.set_note(0, 0, true).unwrap();
        pattern.set_velocity(0, 4, 90).unwrap();
        pattern.set_gate(0, 4, 0.25).unwrap();

        let cached = CachedPattern::for_channel(&pattern, 0).unwrap();

        assert!(cached.note(0));
        assert_eq!(cached.velocity(0), Some(DEFAULT_VELOCITY));
        assert_eq!(cached.gate(0), Some(DEFAULT_GATE));
        assert_eq!(cached.velocity(4), Some(90));
        assert_eq!(cached.gate(4), Some(0.25));

        // Silent step reads as absent, not default
        assert!(!cached.note(1));
        assert_eq!(cached.velocity(1), None);
        assert_eq!(cached.probability(1), None);
    }

    #[test]
    fn test_out_of_range_reads_silent() {
        let pattern = Pattern::new(8, 1).unwrap();
        let cached = CachedPattern::for_channel(&pattern, 0).unwrap();

        assert!(!cached.note(8));
        assert_eq!(cached.velocity(100), None);
    }

    #[test]
    fn test_bad_channel_rejected() {
        let pattern = Pattern::new(8, 1).unwrap();
        assert!(CachedPattern::for_channel(&pattern, 1).is_err());
    }

    #[test]
    fn test_snapshot_is_decoupled_from_source() {
        let mut pattern = Pattern::new(8, 1).unwrap();
        pattern.set_note(0, 2, true).unwrap();

        let cached = CachedPattern::for_channel(&pattern, 0).unwrap();
        pattern.set_note(0, 2, false).unwrap();

        // The snapshot still sees the note; the edit marked the clip dirty
        // and a rebuild would pick up the change
        assert!(cached.note(2));
    }
}

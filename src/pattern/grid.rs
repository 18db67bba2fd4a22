// Pattern - Step grid with per-step attribute lanes
// Pure data + accessor logic; no time concept beyond the step index

use super::PatternError;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_STEPS: usize = 2;
pub const MAX_STEPS: usize = 512;
pub const MIN_CHANNELS: usize = 1;
pub const MAX_CHANNELS: usize = 60;

pub const DEFAULT_VELOCITY: u8 = 127;
pub const DEFAULT_GATE: f64 = 1.0;
pub const DEFAULT_PROBABILITY: f32 = 1.0;
pub const DEFAULT_PITCH_OFFSET: i8 = 0;
pub const DEFAULT_TREMOLO: u8 = 0;
pub const MAX_TREMOLO: u8 = 8;

/// Default step length: a sixteenth note at quarter-note beats
pub const DEFAULT_STEP_LENGTH_BEATS: f64 = 0.25;

/// Tagged result of reading a per-step attribute
///
/// Distinguishes "step exists but the attribute was never written" from
/// "the index is outside the pattern" - two cases that must never be
/// conflated by callers picking defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepValue<T> {
    /// The attribute has a concrete value at this step
    Set(T),
    /// The step is in range but carries no value (note off, or never written)
    Unset,
    /// Channel or step index outside the pattern
    OutOfRange,
}

impl<T> StepValue<T> {
    /// The stored value, if any
    pub fn value(self) -> Option<T> {
        match self {
            StepValue::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Resolve against a default: `Unset` becomes the default,
    /// `OutOfRange` stays an error (`None`)
    pub fn resolve(self, default: T) -> Option<T> {
        match self {
            StepValue::Set(v) => Some(v),
            StepValue::Unset => Some(default),
            StepValue::OutOfRange => None,
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, StepValue::OutOfRange)
    }
}

/// Direction for circular channel rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Left,
    Right,
}

/// One channel's worth of step data
///
/// `bits` always holds `num_steps` entries. The attribute arrays are
/// sparse: entries past their physical length mean "default". They are
/// extended on write, never on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StepLane {
    bits: Vec<bool>,
    velocities: Vec<u8>,
    gates: Vec<f64>,
    probabilities: Vec<f32>,
    pitch_offsets: Vec<i8>,
    tremolos: Vec<u8>,
}

impl StepLane {
    fn new(num_steps: usize) -> Self {
        Self {
            bits: vec![false; num_steps],
            ..Self::default()
        }
    }

    fn clear_bits(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = false);
    }
}

/// A reusable grid of steps across all channels
///
/// Mutations validate their indices and values up front and leave the
/// pattern untouched on rejection. Reads return [`StepValue`] so callers
/// can tell an unwritten step from an out-of-range index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    name: String,
    num_steps: usize,
    step_length_beats: f64,
    lanes: Vec<StepLane>,
}

impl Pattern {
    /// Create an empty pattern (all channels, all steps cleared)
    pub fn new(num_steps: usize, num_channels: usize) -> Result<Self, PatternError> {
        if !(MIN_STEPS..=MAX_STEPS).contains(&num_steps) {
            return Err(PatternError::StepCountOutOfRange(num_steps));
        }
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&num_channels) {
            return Err(PatternError::ChannelCountOutOfRange(num_channels));
        }

        Ok(Self {
            name: String::new(),
            num_steps,
            step_length_beats: DEFAULT_STEP_LENGTH_BEATS,
            lanes: (0..num_channels).map(|_| StepLane::new(num_steps)).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn num_channels(&self) -> usize {
        self.lanes.len()
    }

    /// Length of one step as a fraction of a beat
    pub fn step_length_beats(&self) -> f64 {
        self.step_length_beats
    }

    pub fn set_step_length_beats(&mut self, length: f64) -> Result<(), PatternError> {
        if !(length.is_finite() && length > 0.0) {
            return Err(PatternError::InvalidStepLength);
        }
        self.step_length_beats = length;
        Ok(())
    }

    /// Total pattern length in beats
    pub fn length_beats(&self) -> f64 {
        self.num_steps as f64 * self.step_length_beats
    }

    fn check_channel(&self, channel: usize) -> Result<(), PatternError> {
        if channel >= self.lanes.len() {
            return Err(PatternError::ChannelOutOfRange {
                index: channel,
                count: self.lanes.len(),
            });
        }
        Ok(())
    }

    fn check_index(&self, channel: usize, step: usize) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        if step >= self.num_steps {
            return Err(PatternError::StepOutOfRange {
                index: step,
                count: self.num_steps,
            });
        }
        Ok(())
    }

    fn in_range(&self, channel: usize, step: usize) -> bool {
        channel < self.lanes.len() && step < self.num_steps
    }

    //==========================================================================
    // Step bits

    /// Whether a note is triggered at this step
    pub fn note(&self, channel: usize, step: usize) -> StepValue<bool> {
        if !self.in_range(channel, step) {
            return StepValue::OutOfRange;
        }
        StepValue::Set(self.lanes[channel].bits[step])
    }

    /// Set or clear a note
    ///
    /// Turning a note on writes default velocity, gate and tremolo for the
    /// step if they were never written, so an editor only touches one value
    /// per step. Turning a note off keeps the attributes (soft delete).
    pub fn set_note(&mut self, channel: usize, step: usize, on: bool) -> Result<(), PatternError> {
        self.check_index(channel, step)?;

        let lane = &mut self.lanes[channel];
        lane.bits[step] = on;

        if on {
            if lane.velocities.len() <= step {
                lane.velocities.resize(step + 1, DEFAULT_VELOCITY);
            }
            if lane.gates.len() <= step {
                lane.gates.resize(step + 1, DEFAULT_GATE);
            }
            if lane.tremolos.len() <= step {
                lane.tremolos.resize(step + 1, DEFAULT_TREMOLO);
            }
        }

        Ok(())
    }

    /// One channel's step bits
    pub fn row(&self, channel: usize) -> Result<&[bool], PatternError> {
        self.check_channel(channel)?;
        Ok(&self.lanes[channel].bits)
    }

    /// Overwrite one channel's step bits; extra entries are ignored,
    /// missing ones are cleared
    pub fn set_row(&mut self, channel: usize, bits: &[bool]) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        let lane = &mut self.lanes[channel];
        for (i, bit) in lane.bits.iter_mut().enumerate() {
            *bit = bits.get(i).copied().unwrap_or(false);
        }
        Ok(())
    }

    //==========================================================================
    // Per-step attributes

    fn attribute<'a, T: Copy + 'a>(
        &'a self,
        channel: usize,
        step: usize,
        values: impl Fn(&'a StepLane) -> &'a [T],
    ) -> StepValue<T> {
        if !self.in_range(channel, step) {
            return StepValue::OutOfRange;
        }

        let lane = &self.lanes[channel];
        if !lane.bits[step] {
            return StepValue::Unset;
        }

        match values(lane).get(step) {
            Some(&v) => StepValue::Set(v),
            None => StepValue::Unset,
        }
    }

    fn write_attribute<T: Copy>(
        lane_values: &mut Vec<T>,
        step: usize,
        value: T,
        default: T,
    ) {
        if lane_values.len() <= step {
            lane_values.resize(step + 1, default);
        }
        lane_values[step] = value;
    }

    pub fn velocity(&self, channel: usize, step: usize) -> StepValue<u8> {
        self.attribute(channel, step, |lane| &lane.velocities)
    }

    /// Set velocity; enables the note first so the value is meaningful
    pub fn set_velocity(&mut self, channel: usize, step: usize, value: u8) -> Result<(), PatternError> {
        if value > 127 {
            return Err(PatternError::InvalidVelocity(value));
        }
        self.set_note(channel, step, true)?;
        Self::write_attribute(&mut self.lanes[channel].velocities, step, value, DEFAULT_VELOCITY);
        Ok(())
    }

    pub fn gate(&self, channel: usize, step: usize) -> StepValue<f64> {
        self.attribute(channel, step, |lane| &lane.gates)
    }

    /// Set gate length as a fraction of the step duration
    /// A gate of zero clears the note (nothing would sound)
    pub fn set_gate(&mut self, channel: usize, step: usize, value: f64) -> Result<(), PatternError> {
        if !(0.0..=1.0).contains(&value) || !value.is_finite() {
            return Err(PatternError::InvalidGate(value));
        }
        self.set_note(channel, step, value != 0.0)?;
        Self::write_attribute(&mut self.lanes[channel].gates, step, value, DEFAULT_GATE);
        Ok(())
    }

    pub fn probability(&self, channel: usize, step: usize) -> StepValue<f32> {
        self.attribute(channel, step, |lane| &lane.probabilities)
    }

    /// Set the chance the step fires at generation time
    /// A probability of zero clears the note
    pub fn set_probability(&mut self, channel: usize, step: usize, value: f32) -> Result<(), PatternError> {
        if !(0.0..=1.0).contains(&value) || !value.is_finite() {
            return Err(PatternError::InvalidProbability(value));
        }
        self.set_note(channel, step, value != 0.0)?;
        Self::write_attribute(&mut self.lanes[channel].probabilities, step, value, DEFAULT_PROBABILITY);
        Ok(())
    }

    pub fn pitch_offset(&self, channel: usize, step: usize) -> StepValue<i8> {
        self.attribute(channel, step, |lane| &lane.pitch_offsets)
    }

    /// Set the semitone offset applied to the channel's base pitch
    pub fn set_pitch_offset(&mut self, channel: usize, step: usize, value: i8) -> Result<(), PatternError> {
        self.set_note(channel, step, true)?;
        Self::write_attribute(&mut self.lanes[channel].pitch_offsets, step, value, DEFAULT_PITCH_OFFSET);
        Ok(())
    }

    pub fn tremolo(&self, channel: usize, step: usize) -> StepValue<u8> {
        self.attribute(channel, step, |lane| &lane.tremolos)
    }

    /// Set the repeat count generated within the step's gate window
    pub fn set_tremolo(&mut self, channel: usize, step: usize, value: u8) -> Result<(), PatternError> {
        if value > MAX_TREMOLO {
            return Err(PatternError::InvalidTremolo(value));
        }
        self.set_note(channel, step, true)?;
        Self::write_attribute(&mut self.lanes[channel].tremolos, step, value, DEFAULT_TREMOLO);
        Ok(())
    }

    //==========================================================================
    // Whole-channel operations

    /// Clear every channel's bits and attributes
    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            *lane = StepLane::new(self.num_steps);
        }
    }

    /// Clear one channel's bits (attributes survive for re-enabling)
    pub fn clear_channel(&mut self, channel: usize) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        self.lanes[channel].clear_bits();
        Ok(())
    }

    /// Insert an empty channel at the given index
    pub fn insert_channel(&mut self, channel: usize) -> Result<(), PatternError> {
        if self.lanes.len() >= MAX_CHANNELS {
            return Err(PatternError::ChannelCountOutOfRange(self.lanes.len() + 1));
        }
        let at = channel.min(self.lanes.len());
        self.lanes.insert(at, StepLane::new(self.num_steps));
        Ok(())
    }

    /// Remove a channel
    pub fn remove_channel(&mut self, channel: usize) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        if self.lanes.len() <= MIN_CHANNELS {
            return Err(PatternError::ChannelCountOutOfRange(self.lanes.len() - 1));
        }
        self.lanes.remove(channel);
        Ok(())
    }

    /// Uniform-random bit per step on one channel
    pub fn randomize_channel(&mut self, channel: usize, rng: &mut impl Rng) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        for step in 0..self.num_steps {
            let on = rng.r#gen::<bool>();
            self.set_note(channel, step, on)?;
        }
        Ok(())
    }

    /// For every step index, one uniformly chosen channel receives the hit
    /// Guarantees exactly `num_steps` set bits across the whole pattern
    pub fn randomize_all_steps(&mut self, rng: &mut impl Rng) {
        for lane in &mut self.lanes {
            lane.clear_bits();
        }

        let num_channels = self.lanes.len();
        for step in 0..self.num_steps {
            let channel = rng.gen_range(0..num_channels);
            // In-range by construction
            let _ = self.set_note(channel, step, true);
        }
    }

    /// Circular rotation of one channel's bits
    pub fn shift_channel(&mut self, channel: usize, direction: ShiftDirection) -> Result<(), PatternError> {
        self.check_channel(channel)?;
        let bits = &mut self.lanes[channel].bits;
        match direction {
            ShiftDirection::Right => bits.rotate_right(1),
            ShiftDirection::Left => bits.rotate_left(1),
        }
        Ok(())
    }

    /// Set step i on iff `i % interval == 0`, overwriting prior bits
    pub fn toggle_at_interval(&mut self, channel: usize, interval: usize) -> Result<(), PatternError> {
        if interval == 0 {
            return Err(PatternError::InvalidInterval);
        }
        self.check_channel(channel)?;
        for step in 0..self.num_steps {
            self.set_note(channel, step, step % interval == 0)?;
        }
        Ok(())
    }
}

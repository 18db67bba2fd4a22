// SequenceGenerator - Flattens a clip's pattern sequence into a
// time-ordered event list the playback nodes can stream
// Deterministic: the same seed and unchanged clip produce identical output

use crate::clip::StepClip;
use crate::pattern::{CachedPattern, GrooveTemplate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Output time coordinates
///
/// `Seconds` carries the beat-to-seconds conversion owned by the tempo
/// map collaborator; this crate never assumes a fixed tempo here.
#[derive(Clone, Copy)]
pub enum TimeBase<'a> {
    Beats,
    Seconds(&'a dyn Fn(f64) -> f64),
}

impl<'a> TimeBase<'a> {
    fn convert(&self, beats: f64) -> f64 {
        match self {
            TimeBase::Beats => beats,
            TimeBase::Seconds(to_seconds) => to_seconds(beats),
        }
    }
}

/// One generated note: immutable once produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedEvent {
    /// Grid channel (lane) index
    pub channel: usize,
    /// Target MIDI channel, 1-16, from the lane's metadata
    pub midi_channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    /// Start time in the requested time base
    pub start: f64,
    /// Sustain length in the requested time base
    pub duration: f64,
    /// Step index this event came from
    pub source_step: usize,
}

impl GeneratedEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A flat, sorted event list
///
/// Ordering is by start time, ties broken by channel then source step, so
/// two generations of the same material compare equal element for element.
#[derive(Debug, Clone, Default)]
pub struct EventSequence {
    events: Vec<GeneratedEvent>,
}

impl EventSequence {
    fn from_unsorted(mut events: Vec<GeneratedEvent>) -> Self {
        events.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(Ordering::Equal)
                .then(a.channel.cmp(&b.channel))
                .then(a.source_step.cmp(&b.source_step))
        });
        Self { events }
    }

    pub fn events(&self) -> &[GeneratedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time the last event stops sounding
    pub fn end_time(&self) -> f64 {
        self.events.iter().map(GeneratedEvent::end).fold(0.0, f64::max)
    }

    /// Index of the first event starting at or after `time`
    /// Used to reposition a playback cursor after a jump
    pub fn first_index_at_or_after(&self, time: f64) -> usize {
        self.events.partition_point(|e| e.start < time)
    }
}

/// Walks a clip's resolved pattern instances and emits note events
///
/// Probability rolls come from one seeded RNG per `generate` call, drawn
/// in (instance, channel, step) order, so generation is idempotent for
/// unchanged input.
#[derive(Debug, Clone, Copy)]
pub struct SequenceGenerator {
    seed: u64,
}

impl SequenceGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Generate the event sequence for one grid channel
    ///
    /// `restrict_to_instance` limits output to a single sequence position;
    /// `None` walks the whole clip timeline.
    pub fn generate_channel(
        &self,
        clip: &StepClip,
        channel: usize,
        restrict_to_instance: Option<usize>,
        grooves: &[GrooveTemplate],
        time_base: TimeBase,
    ) -> EventSequence {
        let mut events = Vec::new();
        self.collect_channel(clip, channel, restrict_to_instance, grooves, time_base, &mut events);
        EventSequence::from_unsorted(events)
    }

    /// Generate one merged event sequence across all channels
    pub fn generate(
        &self,
        clip: &StepClip,
        restrict_to_instance: Option<usize>,
        grooves: &[GrooveTemplate],
        time_base: TimeBase,
    ) -> EventSequence {
        let mut events = Vec::new();
        for channel in 0..clip.channels().len() {
            self.collect_channel(clip, channel, restrict_to_instance, grooves, time_base, &mut events);
        }
        EventSequence::from_unsorted(events)
    }

    fn collect_channel(
        &self,
        clip: &StepClip,
        channel: usize,
        restrict_to_instance: Option<usize>,
        grooves: &[GrooveTemplate],
        time_base: TimeBase,
        events: &mut Vec<GeneratedEvent>,
    ) {
        let Some(channel_info) = clip.channel(channel) else {
            return; // fail closed: silence, never a fault
        };

        let groove = channel_info
            .groove()
            .filter(|_| channel_info.uses_groove())
            .and_then(|settings| {
                grooves
                    .iter()
                    .find(|t| t.name == settings.template)
                    .map(|t| (t, settings.strength as f64))
            });

        // Channel-scoped RNG keeps rolls independent of which other
        // channels are generated, so per-channel and merged output agree
        let mut rng = StdRng::seed_from_u64(self.seed ^ (channel as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));

        for (position, instance) in clip.pattern_instances().iter().enumerate() {
            if let Some(only) = restrict_to_instance {
                if position != only {
                    continue;
                }
            }

            let Some(pattern) = clip.pattern(instance.pattern_index) else {
                continue; // dangling instance: silent span
            };
            if channel >= pattern.num_channels() {
                continue;
            }
            let Ok(cached) = CachedPattern::for_channel(pattern, channel) else {
                continue;
            };

            let step_length = cached.step_length_beats();

            for step in 0..cached.num_steps() {
                if !cached.note(step) {
                    continue;
                }

                let probability = cached.probability(step).unwrap_or(1.0);
                if rng.r#gen::<f32>() >= probability {
                    continue;
                }

                let velocity = cached.velocity(step).unwrap_or(127);
                let gate = cached.gate(step).unwrap_or(1.0);
                let offset = cached.pitch_offset(step).unwrap_or(0);
                let tremolo = cached.tremolo(step).unwrap_or(0);

                let pitch = (channel_info.note_number as i16 + offset as i16).clamp(0, 127) as u8;

                let shift = groove
                    .as_ref()
                    .map(|(template, strength)| template.shift_for_step(step) * strength * step_length)
                    .unwrap_or(0.0);

                let start_beat = instance.start_beat + step as f64 * step_length + shift;
                let window = gate * step_length;

                // Tremolo fans the step out into repeats inside the same
                // step + gate window; count 0 means a single note
                let repeats = tremolo as usize + 1;
                let slice = window / repeats as f64;

                for repeat in 0..repeats {
                    let slice_start = start_beat + repeat as f64 * slice;
                    let start = time_base.convert(slice_start);
                    let duration = time_base.convert(slice_start + slice) - start;

                    events.push(GeneratedEvent {
                        channel,
                        midi_channel: channel_info.midi_channel,
                        pitch,
                        velocity,
                        start,
                        duration,
                        source_step: step,
                    });
                }
            }
        }
    }
}

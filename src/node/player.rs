// SequencePlayerNode - Streams pre-generated event sequences into MIDI
// buffers in playback order, surviving loop wraps and seeks

use super::{BlockContext, Node, OutputProfile};
use crate::generator::EventSequence;
use crate::midi::MidiEvent;
use crate::playhead::PlayHead;
use crate::timeline::Tempo;
use std::sync::Arc;

/// Upper bound on simultaneously sounding notes per player
const MAX_ACTIVE_NOTES: usize = 128;

/// A note-on that has been emitted and awaits its note-off
#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    midi_channel: u8,
    pitch: u8,
    end_beat: f64,
}

/// Plays one of several precomputed event sequences against the shared
/// playhead
///
/// Sequences hold beat-time events; the beat-to-sample mapping is redone
/// from `prepare`'s sample rate, so a rate change never regenerates event
/// content. Multiple sequences act as alternate takes sharing one node;
/// switching takes effect at the next block and releases sustained notes
/// first.
pub struct SequencePlayerNode {
    sequences: Vec<EventSequence>,
    active_sequence: usize,
    playhead: Arc<PlayHead>,
    tempo: Tempo,
    sample_rate: f64,
    cursor: usize,
    active_notes: Vec<ActiveNote>,
    mute_delegate: Option<Box<dyn Fn() -> bool + Send>>,
    was_muted: bool,
    needs_reposition: bool,
    prepared: bool,
}

impl SequencePlayerNode {
    pub fn new(sequences: Vec<EventSequence>, playhead: Arc<PlayHead>, tempo: Tempo) -> Self {
        Self {
            sequences,
            active_sequence: 0,
            playhead,
            tempo,
            sample_rate: 0.0,
            cursor: 0,
            active_notes: Vec::with_capacity(MAX_ACTIVE_NOTES),
            mute_delegate: None,
            was_muted: false,
            needs_reposition: true,
            prepared: false,
        }
    }

    /// Delegate polled once per block; returning true silences new notes
    pub fn set_mute_delegate(&mut self, delegate: impl Fn() -> bool + Send + 'static) {
        self.mute_delegate = Some(Box::new(delegate));
    }

    pub fn active_sequence(&self) -> usize {
        self.active_sequence
    }

    /// Select which sequence plays; out-of-range indices are rejected
    pub fn set_active_sequence(&mut self, index: usize) -> bool {
        if index >= self.sequences.len() || index == self.active_sequence {
            return index == self.active_sequence;
        }
        self.active_sequence = index;
        self.needs_reposition = true;
        true
    }

    fn current_events(&self) -> &EventSequence {
        &self.sequences[self.active_sequence]
    }

    /// Emit note-offs for everything sounding and forget it
    fn flush_active_notes(&mut self, midi: &mut crate::midi::MidiBuffer) {
        for note in &self.active_notes {
            midi.push(
                MidiEvent::NoteOff {
                    channel: note.midi_channel,
                    note: note.pitch,
                },
                0,
            );
        }
        self.active_notes.clear();
    }

    fn beat_to_block_offset(&self, beat: f64, reference_sample: u64, num_samples: usize) -> u32 {
        let absolute = self.tempo.beats_to_samples(beat, self.sample_rate);
        let offset = absolute.saturating_sub(reference_sample);
        offset.min(num_samples.saturating_sub(1) as u64) as u32
    }
}

impl Node for SequencePlayerNode {
    fn output_profile(&self) -> OutputProfile {
        OutputProfile {
            channel_count: 0,
            has_audio: false,
            has_midi: true,
        }
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize) {
        // A rate change moves every beat-to-sample mapping; the cursor is
        // re-derived from the playhead on the next block
        if self.prepared && sample_rate != self.sample_rate {
            self.needs_reposition = true;
        }
        self.sample_rate = sample_rate;
        self.prepared = true;
    }

    fn process(&mut self, context: &mut BlockContext<'_>) {
        if self.sequences.is_empty() {
            return; // valid: silence
        }

        debug_assert!(self.prepared, "process called before prepare");
        if !self.prepared {
            return; // release builds: silence, never a fault
        }

        let start_beat = self
            .tempo
            .samples_to_beats(context.reference_sample, self.sample_rate);
        let end_beat = self.tempo.samples_to_beats(
            context.reference_sample + context.num_samples as u64,
            self.sample_rate,
        );

        if !self.playhead.is_playing() {
            self.flush_active_notes(context.midi);
            self.needs_reposition = true;
            return;
        }

        // Discontinuities: transport jump, take switch, or rate change.
        // Release everything sounding and rescan from the new position.
        if self.playhead.did_jump_this_block() || self.needs_reposition {
            self.flush_active_notes(context.midi);
            self.cursor = self.current_events().first_index_at_or_after(start_beat);
            self.needs_reposition = false;
        }

        let muted = self.mute_delegate.as_ref().map(|d| d()).unwrap_or(false);
        if muted && !self.was_muted {
            self.flush_active_notes(context.midi);
        }
        self.was_muted = muted;

        // Note-ons starting inside this block. When muted the cursor still
        // advances so unmuting resumes at the right position.
        let events = &self.sequences[self.active_sequence];
        while self.cursor < events.len() {
            let event = events.events()[self.cursor];
            if event.start >= end_beat {
                break;
            }
            self.cursor += 1;

            if muted || event.start < start_beat {
                continue;
            }

            if self.active_notes.len() < self.active_notes.capacity() {
                let offset = self.beat_to_block_offset(
                    event.start,
                    context.reference_sample,
                    context.num_samples,
                );
                context.midi.push(
                    MidiEvent::NoteOn {
                        channel: event.midi_channel,
                        note: event.pitch,
                        velocity: event.velocity,
                    },
                    offset,
                );
                self.active_notes.push(ActiveNote {
                    midi_channel: event.midi_channel,
                    pitch: event.pitch,
                    end_beat: event.end(),
                });
            }
        }

        // Note-offs falling due inside this block, including notes that
        // both started and ended above
        let tempo = self.tempo;
        let sample_rate = self.sample_rate;
        let reference = context.reference_sample;
        let num_samples = context.num_samples;
        let midi = &mut *context.midi;
        self.active_notes.retain(|note| {
            if note.end_beat < end_beat {
                let absolute = tempo.beats_to_samples(note.end_beat, sample_rate);
                let offset = absolute
                    .saturating_sub(reference)
                    .min(num_samples.saturating_sub(1) as u64) as u32;
                midi.push(
                    MidiEvent::NoteOff {
                        channel: note.midi_channel,
                        note: note.pitch,
                    },
                    offset,
                );
                false
            } else {
                true
            }
        });

        // Off-before-on at equal offsets
        context.midi.sort();
    }
}

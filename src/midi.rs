// MIDI event types and the per-block event buffer

/// A MIDI event addressed to a channel (1-16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    /// CC 123: all notes off
    pub const ALL_NOTES_OFF_CC: u8 = 123;

    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, MidiEvent::NoteOff { .. })
    }
}

/// MIDI event with sample-accurate timing
/// `samples_from_now` is relative to the current block's first sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEventTimed {
    pub event: MidiEvent,
    pub samples_from_now: u32,
}

/// Per-block MIDI event buffer
///
/// Capacity is reserved up front so the rendering path never reallocates.
/// `all_notes_off` marks the whole buffer: downstream consumers must
/// release every sounding note before applying the buffer's events. It is
/// raised on playhead jumps and mute edges where the producer cannot know
/// which notes are sounding downstream.
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    events: Vec<MidiEventTimed>,
    pub all_notes_off: bool,
}

impl MidiBuffer {
    /// Create a buffer with reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            all_notes_off: false,
        }
    }

    pub fn events(&self) -> &[MidiEventTimed] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append an event; silently dropped if the buffer is full
    /// (overflow must not allocate on the rendering path)
    pub fn push(&mut self, event: MidiEvent, samples_from_now: u32) {
        if self.events.len() < self.events.capacity() {
            self.events.push(MidiEventTimed {
                event,
                samples_from_now,
            });
        }
    }

    /// Copy another buffer's contents into this one
    pub fn copy_from(&mut self, other: &MidiBuffer) {
        self.events.clear();
        for timed in other.events.iter().take(self.events.capacity()) {
            self.events.push(*timed);
        }
        self.all_notes_off = other.all_notes_off;
    }

    /// Sort by sample offset, note-offs before note-ons at equal offsets
    /// Prevents stuck notes when an off and an on share a timestamp
    pub fn sort(&mut self) {
        self.events.sort_unstable_by_key(|timed| {
            let kind = match timed.event {
                MidiEvent::NoteOff { .. } => 0u8,
                MidiEvent::ControlChange { .. } => 1,
                MidiEvent::NoteOn { .. } => 2,
            };
            (timed.samples_from_now, kind)
        });
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.all_notes_off = false;
    }
}

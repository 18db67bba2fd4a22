// Channel - Per-lane metadata mapping grid rows to MIDI targets
// Channels are owned by the clip; pattern lanes reference them by index

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIDI_CHANNEL: u8 = 1;
pub const DEFAULT_NOTE_NUMBER: u8 = 60; // Middle C

/// A timing displacement template applied at generation time
///
/// Shifts are expressed as fractions of one step and cycle over the
/// template length, so an 8-entry template grooves a 32-step pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrooveTemplate {
    pub name: String,
    shifts: Vec<f32>,
}

impl GrooveTemplate {
    pub fn new(name: impl Into<String>, shifts: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shifts,
        }
    }

    /// Classic swing: every second step pushed late by `amount` of a step
    pub fn swing(name: impl Into<String>, amount: f32) -> Self {
        Self::new(name, vec![0.0, amount])
    }

    /// Displacement for a step index, in fractions of one step
    pub fn shift_for_step(&self, step: usize) -> f64 {
        if self.shifts.is_empty() {
            return 0.0;
        }
        self.shifts[step % self.shifts.len()] as f64
    }
}

/// A channel's opt-in to a groove template, by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrooveSettings {
    pub template: String,
    /// How much of the template's displacement applies, 0.0-1.0
    pub strength: f32,
}

impl GrooveSettings {
    pub fn new(template: impl Into<String>, strength: f32) -> Self {
        Self {
            template: template.into(),
            strength: strength.clamp(0.0, 1.0),
        }
    }
}

/// Per-track metadata for one grid row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Target MIDI channel, 1-16
    pub midi_channel: u8,
    /// Base pitch, 0-127; step pitch offsets are relative to this
    pub note_number: u8,
    /// Display name
    pub name: String,
    groove: Option<GrooveSettings>,
}

impl Channel {
    pub fn new(midi_channel: u8, note_number: u8) -> Self {
        assert!(
            (1..=16).contains(&midi_channel),
            "MIDI channel must be 1-16"
        );
        assert!(note_number <= 127, "Note number must be 0-127");

        Self {
            midi_channel,
            note_number,
            name: String::new(),
            groove: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn groove(&self) -> Option<&GrooveSettings> {
        self.groove.as_ref()
    }

    pub fn set_groove(&mut self, groove: Option<GrooveSettings>) {
        self.groove = groove;
    }

    /// Whether groove displacement applies to this channel at all
    pub fn uses_groove(&self) -> bool {
        matches!(&self.groove, Some(g) if !g.template.is_empty() && g.strength > 0.0)
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(DEFAULT_MIDI_CHANNEL, DEFAULT_NOTE_NUMBER)
    }
}

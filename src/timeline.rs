// Timeline - Musical time representation
// Handles conversion between beats, seconds and samples

use std::fmt;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar (typically 3, 4, 5, 6, 7)
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    pub fn new(numerator: u8, denominator: u8) -> Self {
        assert!(numerator > 0, "Time signature numerator must be > 0");
        assert!(
            denominator.is_power_of_two(),
            "Time signature denominator must be power of 2"
        );
        Self {
            numerator,
            denominator,
        }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    /// Number of beats per bar
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (20.0..=999.0).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one beat in samples at given sample rate
    pub fn beat_duration_samples(&self, sample_rate: f64) -> f64 {
        self.beat_duration_seconds() * sample_rate
    }

    /// Convert a beat position to seconds
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.beat_duration_seconds()
    }

    /// Convert a beat position to a sample position (rounded to nearest)
    pub fn beats_to_samples(&self, beats: f64, sample_rate: f64) -> u64 {
        (beats * self.beat_duration_samples(sample_rate)).round().max(0.0) as u64
    }

    /// Convert a sample position to beats
    pub fn samples_to_beats(&self, samples: u64, sample_rate: f64) -> f64 {
        samples as f64 / self.beat_duration_samples(sample_rate)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::four_four();
        assert_eq!(ts.numerator, 4);
        assert_eq!(ts.denominator, 4);
        assert_eq!(ts.beats_per_bar(), 4.0);
        assert_eq!(ts.to_string(), "4/4");
    }

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);

        // At 120 BPM, one beat = 0.5s
        // At 48000 Hz, one beat = 24000 samples
        assert_eq!(tempo.beat_duration_samples(48000.0), 24000.0);
    }

    #[test]
    fn test_beat_sample_round_trip() {
        let tempo = Tempo::new(120.0);
        let sample_rate = 48000.0;

        let samples = tempo.beats_to_samples(2.5, sample_rate);
        assert_eq!(samples, 60000);

        let beats = tempo.samples_to_beats(samples, sample_rate);
        assert!((beats - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_beats_to_seconds() {
        let tempo = Tempo::new(60.0);
        assert_eq!(tempo.beats_to_seconds(3.0), 3.0);

        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.beats_to_seconds(4.0), 2.0);
    }
}

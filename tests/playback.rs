//! End-to-end playback tests
//!
//! Drives the full pipeline: edit a clip, rebuild the playback snapshot,
//! stream it through the node graph block by block and check the MIDI
//! that comes out, the way a host's audio callback would.

use gridseq::node::{AudioBlock, BlockContext, Modifier, ModifierNode, MuteState, Node, RenderContext};
use gridseq::pattern::{GrooveSettings, GrooveTemplate};
use gridseq::{
    MidiBuffer, MidiEvent, PlayHead, SequencePlayerNode, StepClip, Tempo, create_snapshot_channel,
    rebuild_if_dirty,
};

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK: usize = 512;

/// One audio callback: latch the jump flag, render, advance the playhead
fn render_block(node: &mut dyn Node, playhead: &PlayHead) -> MidiBuffer {
    let mut audio = AudioBlock::new(2, BLOCK);
    let mut midi = MidiBuffer::with_capacity(128);
    playhead.begin_block();
    let mut context = BlockContext {
        audio: &mut audio,
        midi: &mut midi,
        reference_sample: playhead.position_samples(),
        num_samples: BLOCK,
    };
    node.process(&mut context);
    playhead.advance(BLOCK as u64);
    midi
}

fn four_on_the_floor() -> StepClip {
    let mut clip = StepClip::new("Drums", 1).unwrap();
    clip.create_default_pattern_if_empty().unwrap();
    let pattern = clip.pattern_mut(0).unwrap();
    for step in [0usize, 4, 8, 12] {
        pattern.set_note(0, step, true).unwrap();
    }
    clip
}

#[test]
fn test_edit_to_midi_round_trip() {
    let (mut publisher, mut receiver) = create_snapshot_channel(4);
    let mut clip = four_on_the_floor();

    assert!(rebuild_if_dirty(&mut clip, &[], 0, &mut publisher));
    let snapshot = receiver.latest().unwrap().clone();
    assert_eq!(snapshot.length_beats, 4.0);

    let playhead = PlayHead::new();
    playhead.play();
    let mut player = SequencePlayerNode::new(
        vec![snapshot.events.clone()],
        playhead.clone(),
        Tempo::default(),
    );
    player.prepare(SAMPLE_RATE, BLOCK);

    // One full bar at 120 BPM / 48kHz is 96000 samples
    let mut ons = Vec::new();
    let mut offs = 0;
    while playhead.position_samples() < 96000 {
        let block_start = playhead.position_samples();
        let midi = render_block(&mut player, &playhead);
        for timed in midi.events() {
            match timed.event {
                MidiEvent::NoteOn { note, velocity, .. } => {
                    ons.push((block_start + timed.samples_from_now as u64, note, velocity));
                }
                MidiEvent::NoteOff { .. } => offs += 1,
                _ => {}
            }
        }
    }

    // Hits on beats 0..3, full gate sixteenths, default velocity
    assert_eq!(
        ons,
        vec![(0, 60, 127), (24000, 60, 127), (48000, 60, 127), (72000, 60, 127)]
    );
    assert_eq!(offs, 4);
}

#[test]
fn test_edit_while_stopped_then_replay() {
    let (mut publisher, mut receiver) = create_snapshot_channel(4);
    let mut clip = four_on_the_floor();
    rebuild_if_dirty(&mut clip, &[], 0, &mut publisher);
    let first = receiver.latest().unwrap().clone();

    // Add a hit and rebuild: the receiver swaps to the new material
    clip.set_cell(0, 0, 2, true).unwrap();
    assert!(rebuild_if_dirty(&mut clip, &[], 0, &mut publisher));
    let second = receiver.latest().unwrap().clone();

    assert_eq!(first.events.len(), 4);
    assert_eq!(second.events.len(), 5);

    // Unchanged clip: nothing published, the receiver stays put
    assert!(!rebuild_if_dirty(&mut clip, &[], 0, &mut publisher));
    assert_eq!(receiver.latest().unwrap().events.len(), 5);
}

#[test]
fn test_loop_wrap_replays_from_loop_start() {
    let mut clip = StepClip::new("Loop", 1).unwrap();
    clip.create_default_pattern_if_empty().unwrap();
    clip.pattern_mut(0).unwrap().set_note(0, 0, true).unwrap();

    let playhead = PlayHead::new();
    // Loop one beat, rounded to whole blocks (24576 samples = 48 blocks)
    playhead.set_loop_region(0, 24576);
    playhead.set_loop_enabled(true);
    playhead.play();

    let events = gridseq::SequenceGenerator::new(0).generate(
        &clip,
        None,
        &[],
        gridseq::TimeBase::Beats,
    );
    let mut player = SequencePlayerNode::new(vec![events], playhead.clone(), Tempo::default());
    player.prepare(SAMPLE_RATE, BLOCK);

    // Two loop iterations: the step-0 note must fire once per pass
    let mut ons = 0;
    for _ in 0..96 {
        let midi = render_block(&mut player, &playhead);
        ons += midi.events().iter().filter(|e| e.event.is_note_on()).count();
    }
    assert_eq!(ons, 2);
}

#[test]
fn test_seek_mid_bar_releases_and_resumes() {
    let clip = four_on_the_floor();
    let events = gridseq::SequenceGenerator::new(0).generate(
        &clip,
        None,
        &[],
        gridseq::TimeBase::Beats,
    );

    let playhead = PlayHead::new();
    playhead.play();
    let mut player = SequencePlayerNode::new(vec![events], playhead.clone(), Tempo::default());
    player.prepare(SAMPLE_RATE, BLOCK);

    let midi = render_block(&mut player, &playhead);
    assert_eq!(midi.events().iter().filter(|e| e.event.is_note_on()).count(), 1);

    // Seek to beat 3 while the first note sustains
    playhead.set_position_samples(72000);
    let midi = render_block(&mut player, &playhead);

    // Release comes before the beat-3 note-on
    let kinds: Vec<bool> = midi.events().iter().map(|e| e.event.is_note_on()).collect();
    assert_eq!(kinds, vec![false, true]);
    assert!(midi.events().iter().all(|e| e.samples_from_now == 0));
}

/// Pass-through modifier standing in for external DSP
struct NullModifier;

impl Modifier for NullModifier {
    fn initialize(&mut self, _sample_rate: f64, _max_block_size: usize) {}
    fn apply(&mut self, _context: &mut RenderContext<'_>) {}
    fn deinitialize(&mut self) {}
    fn wants_midi(&self) -> bool {
        true
    }
}

#[test]
fn test_mute_transition_through_modifier_chain() {
    let clip = four_on_the_floor();
    let events = gridseq::SequenceGenerator::new(0).generate(
        &clip,
        None,
        &[],
        gridseq::TimeBase::Beats,
    );

    let playhead = PlayHead::new();
    playhead.play();
    let mut player = SequencePlayerNode::new(vec![events], playhead.clone(), Tempo::default());
    player.prepare(SAMPLE_RATE, BLOCK);

    let mute = MuteState::new(true);
    let mut chain = ModifierNode::new(
        Box::new(player),
        Box::new(NullModifier),
        playhead.clone(),
        Some(mute.clone()),
    );
    chain.prepare(SAMPLE_RATE, BLOCK);

    let midi = render_block(&mut chain, &playhead);
    assert!(!midi.all_notes_off);
    assert_eq!(midi.events().iter().filter(|e| e.event.is_note_on()).count(), 1);

    // Muting between callbacks flags all-notes-off exactly once
    mute.set_audible(false);
    let midi = render_block(&mut chain, &playhead);
    assert!(midi.all_notes_off);

    let midi = render_block(&mut chain, &playhead);
    assert!(!midi.all_notes_off);
}

#[test]
fn test_groove_shifts_playback_timing() {
    let mut clip = StepClip::new("Hats", 1).unwrap();
    clip.create_default_pattern_if_empty().unwrap();
    {
        let pattern = clip.pattern_mut(0).unwrap();
        pattern.set_note(0, 0, true).unwrap();
        pattern.set_note(0, 1, true).unwrap();
    }
    clip.channel_mut(0)
        .unwrap()
        .set_groove(Some(GrooveSettings::new("swing", 1.0)));

    let grooves = [GrooveTemplate::swing("swing", 0.5)];
    let (mut publisher, mut receiver) = create_snapshot_channel(4);
    rebuild_if_dirty(&mut clip, &grooves, 0, &mut publisher);
    let snapshot = receiver.latest().unwrap().clone();

    let playhead = PlayHead::new();
    playhead.play();
    let mut player = SequencePlayerNode::new(
        vec![snapshot.events.clone()],
        playhead.clone(),
        Tempo::default(),
    );
    player.prepare(SAMPLE_RATE, BLOCK);

    // Step 1 pushed late by half a step: 0.25 + 0.125 beats = 9000 samples
    let mut on_samples = Vec::new();
    while playhead.position_samples() < 12000 {
        let block_start = playhead.position_samples();
        let midi = render_block(&mut player, &playhead);
        for timed in midi.events() {
            if timed.event.is_note_on() {
                on_samples.push(block_start + timed.samples_from_now as u64);
            }
        }
    }
    assert_eq!(on_samples, vec![0, 9000]);
}

#[test]
fn test_probability_material_is_stable_across_replays() {
    let mut clip = StepClip::new("Ghost notes", 1).unwrap();
    clip.create_default_pattern_if_empty().unwrap();
    {
        let pattern = clip.pattern_mut(0).unwrap();
        for step in 0..16 {
            pattern.set_note(0, step, true).unwrap();
            pattern.set_probability(0, step, 0.5).unwrap();
        }
    }

    let (mut publisher, mut receiver) = create_snapshot_channel(4);
    rebuild_if_dirty(&mut clip, &[], 7, &mut publisher);
    let snapshot = receiver.latest().unwrap().clone();

    // The dice were rolled at snapshot time; two playback passes over the
    // same snapshot produce identical note-on patterns
    let run = |events: gridseq::EventSequence| {
        let playhead = PlayHead::new();
        playhead.play();
        let mut player = SequencePlayerNode::new(vec![events], playhead.clone(), Tempo::default());
        player.prepare(SAMPLE_RATE, BLOCK);

        let mut ons = Vec::new();
        while playhead.position_samples() < 96000 {
            let block_start = playhead.position_samples();
            let midi = render_block(&mut player, &playhead);
            for timed in midi.events() {
                if timed.event.is_note_on() {
                    ons.push(block_start + timed.samples_from_now as u64);
                }
            }
        }
        ons
    };

    let first = run(snapshot.events.clone());
    let second = run(snapshot.events.clone());
    assert_eq!(first, second);
    assert!(!first.is_empty());
    assert!(first.len() < 16);
}

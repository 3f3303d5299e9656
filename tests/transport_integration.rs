// Integration tests for playback through the session and the offline engine

use beatgrid::messaging::{NotificationCategory, NotificationConsumer};
use beatgrid::{InstrumentCatalog, OfflineEngine, Session, SessionConfig, Timbre, TransportState};
use ringbuf::traits::Consumer;

fn session() -> (Session<OfflineEngine>, NotificationConsumer) {
    Session::new(
        OfflineEngine::new(),
        InstrumentCatalog::chiptune(),
        SessionConfig::default(),
    )
    .unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_playback_triggers_each_head_once_per_pass() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.create_sustained(0, 0, 0, 3);
    session.toggle(1, 4, 8);
    clock.take_triggers();

    session.start().unwrap();
    assert_eq!(session.transport().state(), TransportState::Running);
    assert_eq!(clock.live_voices(), 3);

    assert_eq!(clock.run_steps(32), 32);
    let triggers = clock.take_triggers();
    assert_eq!(triggers.len(), 4);

    let lead: Vec<_> = triggers
        .iter()
        .filter(|t| t.timbre == Timbre::Square)
        .collect();
    assert_eq!(lead.len(), 2);
    assert_eq!(lead[0].pitch, "C4");
    assert!(approx(lead[0].at, 0.0));
    assert!(approx(lead[0].duration_secs, 0.5));
    assert!(approx(lead[1].at, 2.0));

    let bass = triggers
        .iter()
        .find(|t| t.timbre == Timbre::Triangle)
        .unwrap();
    assert_eq!(bass.pitch, "E2");
    assert!(approx(bass.at, 1.0));

    session.stop();
    assert_eq!(clock.live_voices(), 0);
    let snapshot = session.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.current_step, -1);
}

#[test]
fn test_tail_is_clamped_at_sequence_end() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.create_sustained(0, 0, 14, 15);
    clock.take_triggers();

    session.start().unwrap();
    clock.run_steps(16);
    let triggers = clock.take_triggers();
    assert_eq!(triggers.len(), 1);
    // Two sixteenths at 120 BPM
    assert!(approx(triggers[0].duration_secs, 0.25));
}

#[test]
fn test_edits_while_running_are_heard_next_pass() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.start().unwrap();

    clock.run_steps(4);
    session.toggle(2, 0, 2);
    clock.take_triggers();

    clock.run_steps(12);
    assert!(clock.take_triggers().is_empty());

    clock.run_steps(4);
    let triggers = clock.take_triggers();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].pitch, "C5");
}

#[test]
fn test_resize_while_running_wraps_playhead() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.grow();
    session.start().unwrap();

    clock.run_steps(18);
    assert_eq!(session.snapshot().current_step, 17);

    session.shrink();
    clock.run_steps(1);
    let step = session.snapshot().current_step;
    assert!((0..16).contains(&step));
}

#[test]
fn test_playhead_follows_clock() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.start().unwrap();

    clock.run_steps(3);
    assert_eq!(session.playhead(), Some(2));

    session.stop();
    assert_eq!(session.playhead(), None);
}

#[test]
fn test_tempo_change_while_running() {
    let (mut session, _rx) = session();
    let clock = session.transport().engine().handle();
    session.start().unwrap();
    session.set_tempo(60.0);
    assert_eq!(clock.tempo_bpm(), 60.0);

    session.toggle(0, 0, 0);
    clock.take_triggers();
    clock.run_steps(16);
    let triggers = clock.take_triggers();
    assert_eq!(triggers.len(), 1);
    assert!(approx(triggers[0].duration_secs, 0.25));
}

#[test]
fn test_failed_start_then_recovery() {
    let (mut session, mut rx) = session();
    let clock = session.transport().engine().handle();

    clock.fail_voice_after(1);
    assert!(session.start().is_err());
    assert_eq!(session.transport().state(), TransportState::Stopped);
    assert_eq!(clock.live_voices(), 0);
    assert!(!clock.has_callback());

    let alert = rx.try_pop().unwrap();
    assert_eq!(alert.category, NotificationCategory::Audio);
    assert!(rx.try_pop().is_none());

    clock.allow_voices();
    session.start().unwrap();
    assert_eq!(clock.live_voices(), 3);
    session.stop();
    session.stop();
    assert_eq!(session.transport().state(), TransportState::Stopped);
}

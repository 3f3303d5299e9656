// Offline engine - deterministic audio clock and recording voices
//
// Drives the transport without an audio device: the clock only advances when
// told to, and every trigger is appended to a shared log.

use super::{AudioClock, AudioEngine, AudioError, ClockTime, StepCallback, Voice};
use crate::sequencer::instrument::Timbre;
use crate::sequencer::timeline::Subdivision;
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded voice trigger
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub timbre: Timbre,
    pub pitch: String,
    pub duration_secs: f64,
    pub at: ClockTime,
}

struct ClockState {
    now: ClockTime,
    tempo_bpm: f64,
    running: bool,
    callback: Option<StepCallback>,
    subdivision: Subdivision,
    next_due: ClockTime,
    /// Bumped whenever the callback is replaced or cancelled
    generation: u64,
}

#[derive(Default)]
struct VoicePool {
    created: usize,
    live: usize,
    /// Successful creations left before every further one fails
    remaining_before_failure: Option<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Cloneable control handle over an offline engine
#[derive(Clone)]
pub struct OfflineHandle {
    clock: Arc<Mutex<ClockState>>,
    triggers: Arc<Mutex<Vec<TriggerRecord>>>,
    voices: Arc<Mutex<VoicePool>>,
}

impl OfflineHandle {
    /// Make every voice creation fail
    pub fn fail_voices(&self) {
        self.fail_voice_after(0);
    }

    /// Allow `count` more voice creations, then fail
    pub fn fail_voice_after(&self, count: usize) {
        lock(&self.voices).remaining_before_failure = Some(count);
    }

    /// Stop forcing voice failures
    pub fn allow_voices(&self) {
        lock(&self.voices).remaining_before_failure = None;
    }

    /// Voices created and not yet disposed
    pub fn live_voices(&self) -> usize {
        lock(&self.voices).live
    }

    /// Voices created since the engine was built
    pub fn created_voices(&self) -> usize {
        lock(&self.voices).created
    }

    pub fn is_running(&self) -> bool {
        lock(&self.clock).running
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.clock).callback.is_some()
    }

    pub fn tempo_bpm(&self) -> f64 {
        lock(&self.clock).tempo_bpm
    }

    pub fn now(&self) -> ClockTime {
        lock(&self.clock).now
    }

    /// Recorded triggers, oldest first
    pub fn triggers(&self) -> Vec<TriggerRecord> {
        lock(&self.triggers).clone()
    }

    /// Drain the trigger log
    pub fn take_triggers(&self) -> Vec<TriggerRecord> {
        std::mem::take(&mut *lock(&self.triggers))
    }

    /// Fire the next `count` step callbacks
    ///
    /// Returns how many callbacks actually ran (fewer when the clock is
    /// stopped or the callback is cancelled in between).
    pub fn run_steps(&self, count: usize) -> usize {
        let mut ran = 0;
        for _ in 0..count {
            if !self.tick(None) {
                break;
            }
            ran += 1;
        }
        ran
    }

    /// Advance the clock by `seconds`, firing every step due on the way
    pub fn advance(&self, seconds: f64) -> usize {
        let target = lock(&self.clock).now + seconds;
        let mut ran = 0;
        while self.tick(Some(target)) {
            ran += 1;
        }
        lock(&self.clock).now = target;
        ran
    }

    /// Fire one callback if one is due (before `limit` when given)
    fn tick(&self, limit: Option<ClockTime>) -> bool {
        let (mut callback, due, generation) = {
            let mut state = lock(&self.clock);
            if !state.running || state.callback.is_none() {
                return false;
            }
            let due = state.next_due;
            if limit.is_some_and(|limit| due > limit) {
                return false;
            }
            let period = state.subdivision.beats() * 60.0 / state.tempo_bpm;
            state.now = due;
            state.next_due = due + period;
            match state.callback.take() {
                Some(callback) => (callback, due, state.generation),
                None => return false,
            }
        };

        // Run outside the lock so the callback may use the clock freely
        callback(due);

        let mut state = lock(&self.clock);
        if state.generation == generation && state.callback.is_none() {
            state.callback = Some(callback);
        }
        true
    }
}

/// Clock half of the offline engine
pub struct OfflineClock {
    state: Arc<Mutex<ClockState>>,
}

impl AudioClock for OfflineClock {
    fn set_tempo(&mut self, bpm: f64) {
        lock(&self.state).tempo_bpm = bpm;
    }

    fn schedule_repeating(
        &mut self,
        callback: StepCallback,
        subdivision: Subdivision,
    ) -> Result<(), AudioError> {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.callback = Some(callback);
        state.subdivision = subdivision;
        Ok(())
    }

    fn start(&mut self) {
        let mut state = lock(&self.state);
        if !state.running {
            state.running = true;
            state.next_due = state.now;
        }
    }

    fn stop(&mut self) {
        lock(&self.state).running = false;
    }

    fn cancel(&mut self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.callback = None;
    }

    fn now(&self) -> ClockTime {
        lock(&self.state).now
    }
}

struct OfflineVoice {
    timbre: Timbre,
    triggers: Arc<Mutex<Vec<TriggerRecord>>>,
    pool: Arc<Mutex<VoicePool>>,
    disposed: bool,
}

impl Voice for OfflineVoice {
    fn trigger(&mut self, pitch: &str, duration_secs: f64, at: ClockTime) {
        if self.disposed {
            return;
        }
        lock(&self.triggers).push(TriggerRecord {
            timbre: self.timbre,
            pitch: pitch.to_string(),
            duration_secs,
            at,
        });
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            let mut pool = lock(&self.pool);
            pool.live = pool.live.saturating_sub(1);
        }
    }
}

/// Audio engine with no device behind it
pub struct OfflineEngine {
    handle: OfflineHandle,
    clock: OfflineClock,
}

impl OfflineEngine {
    pub fn new() -> Self {
        let clock_state = Arc::new(Mutex::new(ClockState {
            now: 0.0,
            tempo_bpm: 120.0,
            running: false,
            callback: None,
            subdivision: Subdivision::Sixteenth,
            next_due: 0.0,
            generation: 0,
        }));
        Self {
            handle: OfflineHandle {
                clock: Arc::clone(&clock_state),
                triggers: Arc::new(Mutex::new(Vec::new())),
                voices: Arc::new(Mutex::new(VoicePool::default())),
            },
            clock: OfflineClock { state: clock_state },
        }
    }

    pub fn handle(&self) -> OfflineHandle {
        self.handle.clone()
    }
}

impl Default for OfflineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for OfflineEngine {
    fn create_voice(&mut self, timbre: Timbre) -> Result<Box<dyn Voice>, AudioError> {
        let mut pool = lock(&self.handle.voices);
        match pool.remaining_before_failure {
            Some(0) => {
                return Err(AudioError::VoiceCreation {
                    timbre,
                    reason: "offline engine set to fail".to_string(),
                });
            }
            Some(remaining) => pool.remaining_before_failure = Some(remaining - 1),
            None => {}
        }
        pool.created += 1;
        pool.live += 1;
        Ok(Box::new(OfflineVoice {
            timbre,
            triggers: Arc::clone(&self.handle.triggers),
            pool: Arc::clone(&self.handle.voices),
            disposed: false,
        }))
    }

    fn clock(&mut self) -> &mut dyn AudioClock {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clock_fires_at_sixteenth_intervals() {
        let mut engine = OfflineEngine::new();
        let handle = engine.handle();
        let times = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&times);

        let clock = engine.clock();
        clock.set_tempo(120.0);
        clock
            .schedule_repeating(
                Box::new(move |at| sink.lock().unwrap().push(at)),
                Subdivision::Sixteenth,
            )
            .unwrap();
        clock.start();

        assert_eq!(handle.run_steps(3), 3);
        assert_eq!(*times.lock().unwrap(), vec![0.0, 0.125, 0.25]);
    }

    #[test]
    fn test_advance_fires_due_steps() {
        let mut engine = OfflineEngine::new();
        let handle = engine.handle();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let clock = engine.clock();
        clock.set_tempo(60.0);
        clock
            .schedule_repeating(
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                Subdivision::Sixteenth,
            )
            .unwrap();
        clock.start();

        // 60 BPM: one step every 0.25s; steps at 0.0, 0.25, 0.5, 0.75, 1.0
        assert_eq!(handle.advance(1.0), 5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(handle.now(), 1.0);
    }

    #[test]
    fn test_cancel_and_stop_halt_callbacks() {
        let mut engine = OfflineEngine::new();
        let handle = engine.handle();
        let clock = engine.clock();
        clock
            .schedule_repeating(Box::new(|_| {}), Subdivision::Sixteenth)
            .unwrap();
        assert_eq!(handle.run_steps(1), 0, "clock not started");

        clock.start();
        assert_eq!(handle.run_steps(2), 2);

        clock.cancel();
        clock.stop();
        assert!(!handle.has_callback());
        assert_eq!(handle.run_steps(1), 0);
    }

    #[test]
    fn test_voices_record_triggers_until_disposed() {
        let mut engine = OfflineEngine::new();
        let handle = engine.handle();
        let mut voice = engine.create_voice(Timbre::Square).unwrap();

        voice.trigger("C4", 0.25, 1.0);
        voice.dispose();
        voice.trigger("D4", 0.25, 2.0);

        let triggers = handle.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].pitch, "C4");
        assert_eq!(handle.live_voices(), 0);
        assert_eq!(handle.created_voices(), 1);
    }

    #[test]
    fn test_forced_voice_failure() {
        let mut engine = OfflineEngine::new();
        engine.handle().fail_voices();
        assert!(engine.create_voice(Timbre::Pulse).is_err());

        engine.handle().allow_voices();
        assert!(engine.create_voice(Timbre::Pulse).is_ok());
    }
}

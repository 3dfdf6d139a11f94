use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::vad::VoiceActivityDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    Idle,
    Listening,
    UserSpeaking,
    AssistantSpeaking,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct InterruptConfig {
    pub interrupt_threshold: Duration,
    pub debounce: Duration,
    pub cooldown: Duration,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            interrupt_threshold: Duration::from_millis(200),
            debounce: Duration::from_millis(50),
            cooldown: Duration::from_millis(500),
        }
    }
}

/// Drives barge-in: tracks whether the caller or the assistant is currently
/// speaking and fires `on_interrupt` when caller speech lands while the
/// assistant is mid-turn, gated by a cooldown so rapid VAD flapping can't
/// fire the callback twice in quick succession.
pub struct InterruptManager {
    config: InterruptConfig,
    vad: Mutex<Box<dyn VoiceActivityDetector>>,
    state: Mutex<InterruptState>,
    last_interrupt_at: Mutex<Option<Instant>>,
    interrupted_flag: Arc<AtomicBool>,
    interrupt_count: AtomicU64,
    barge_in_enabled: bool,
}

impl InterruptManager {
    pub fn new(vad: Box<dyn VoiceActivityDetector>, config: InterruptConfig) -> Self {
        Self::with_barge_in(vad, config, true)
    }

    /// Build a manager for an agent with barge-in disabled: VAD still feeds
    /// the user/assistant-speaking state machine (so transcript flow keeps
    /// working), but speech during an assistant turn never trips the
    /// interrupt callback.
    pub fn with_barge_in(vad: Box<dyn VoiceActivityDetector>, config: InterruptConfig, barge_in_enabled: bool) -> Self {
        Self {
            config,
            vad: Mutex::new(vad),
            state: Mutex::new(InterruptState::Idle),
            last_interrupt_at: Mutex::new(None),
            interrupted_flag: Arc::new(AtomicBool::new(false)),
            interrupt_count: AtomicU64::new(0),
            barge_in_enabled,
        }
    }

    pub fn state(&self) -> InterruptState {
        *self.state.lock()
    }

    pub fn is_user_speaking(&self) -> bool {
        matches!(self.state(), InterruptState::UserSpeaking | InterruptState::Interrupted)
    }

    pub fn is_assistant_speaking(&self) -> bool {
        self.state() == InterruptState::AssistantSpeaking
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted_flag.load(Ordering::Acquire)
    }

    /// A cheap, cloneable handle other tasks can poll to check cancellation
    /// without touching the manager's lock.
    pub fn interrupted_handle(&self) -> Arc<AtomicBool> {
        self.interrupted_flag.clone()
    }

    pub fn start_assistant_turn(&self) {
        let mut state = self.state.lock();
        *state = InterruptState::AssistantSpeaking;
        self.interrupted_flag.store(false, Ordering::Release);
    }

    pub fn end_assistant_turn(&self) {
        let mut state = self.state.lock();
        if *state == InterruptState::AssistantSpeaking || *state == InterruptState::Interrupted {
            *state = InterruptState::Listening;
        }
    }

    pub fn start_user_turn(&self) {
        *self.state.lock() = InterruptState::Listening;
    }

    pub fn reset(&self) {
        *self.state.lock() = InterruptState::Idle;
        *self.last_interrupt_at.lock() = None;
        self.interrupted_flag.store(false, Ordering::Release);
    }

    /// Feed one audio frame. Returns `true` exactly on the frame that fires
    /// a barge-in interrupt.
    pub fn process_audio(&self, frame: &[i16]) -> bool {
        let is_speech = self.vad.lock().process_frame(frame);
        if is_speech {
            self.on_speech_start()
        } else {
            self.on_speech_end();
            false
        }
    }

    fn on_speech_start(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            InterruptState::AssistantSpeaking => {
                if !self.barge_in_enabled {
                    return false;
                }
                let mut last = self.last_interrupt_at.lock();
                let now = Instant::now();
                let in_cooldown = last
                    .map(|t| now.duration_since(t) < self.config.cooldown)
                    .unwrap_or(false);
                if in_cooldown {
                    return false;
                }
                *last = Some(now);
                *state = InterruptState::Interrupted;
                self.interrupted_flag.store(true, Ordering::Release);
                self.interrupt_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            InterruptState::Idle | InterruptState::Listening => {
                *state = InterruptState::UserSpeaking;
                false
            }
            InterruptState::UserSpeaking | InterruptState::Interrupted => false,
        }
    }

    fn on_speech_end(&self) {
        let mut state = self.state.lock();
        if matches!(*state, InterruptState::UserSpeaking | InterruptState::Interrupted) {
            *state = InterruptState::Listening;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::SimpleVad;

    fn manager() -> InterruptManager {
        InterruptManager::new(
            Box::new(SimpleVad::new(0.02)),
            InterruptConfig {
                interrupt_threshold: Duration::from_millis(1),
                debounce: Duration::from_millis(1),
                cooldown: Duration::from_millis(1),
            },
        )
    }

    fn loud() -> Vec<i16> {
        vec![20000; 160]
    }
    fn quiet() -> Vec<i16> {
        vec![0; 160]
    }

    #[test]
    fn idle_speech_transitions_to_user_speaking() {
        let m = manager();
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.state(), InterruptState::UserSpeaking);
        assert!(!m.was_interrupted());
    }

    #[test]
    fn speech_during_assistant_turn_interrupts() {
        let m = manager();
        m.start_assistant_turn();
        assert!(m.is_assistant_speaking());
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.state(), InterruptState::Interrupted);
        assert!(m.was_interrupted());
    }

    #[test]
    fn cooldown_suppresses_rapid_reinterrupt() {
        let m = manager();
        m.start_assistant_turn();
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.interrupt_count.load(Ordering::Relaxed), 1);
        // Still within the same assistant turn; state is Interrupted, not
        // AssistantSpeaking, so a second speech run can't re-trigger anyway.
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.interrupt_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn end_turn_returns_to_listening() {
        let m = manager();
        m.start_assistant_turn();
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.state(), InterruptState::Interrupted);
        m.end_assistant_turn();
        assert_eq!(m.state(), InterruptState::Listening);
    }

    #[test]
    fn barge_in_disabled_never_interrupts() {
        let m = InterruptManager::with_barge_in(
            Box::new(SimpleVad::new(0.02)),
            InterruptConfig {
                interrupt_threshold: Duration::from_millis(1),
                debounce: Duration::from_millis(1),
                cooldown: Duration::from_millis(1),
            },
            false,
        );
        m.start_assistant_turn();
        for _ in 0..6 {
            m.process_audio(&loud());
        }
        assert_eq!(m.state(), InterruptState::AssistantSpeaking);
        assert!(!m.was_interrupted());
    }
}

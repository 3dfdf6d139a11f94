//! Per-call usage accumulation (C7).
//!
//! One `UsageTracker` per session, holding monotonic accumulators behind a
//! `parking_lot::Mutex` so `add_*` calls from the task pipeline's hot path
//! never block on other sessions. `end_call` is idempotent: the first call
//! seals the record, later calls return the same sealed copy.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use voice_domain::trace::TraceEvent;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageRecord {
    pub session_id: String,
    pub stt_provider: String,
    pub tts_provider: String,
    pub stt_seconds: f64,
    pub llm_input_tokens: u64,
    pub llm_output_tokens: u64,
    pub tts_chars: u64,
    pub sealed: bool,
}

struct Inner {
    record: UsageRecord,
    started_at: std::time::Instant,
}

pub struct UsageTracker {
    inner: Mutex<Inner>,
}

impl UsageTracker {
    pub fn start_call(
        session_id: impl Into<String>,
        stt_provider: impl Into<String>,
        tts_provider: impl Into<String>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                record: UsageRecord {
                    session_id: session_id.into(),
                    stt_provider: stt_provider.into(),
                    tts_provider: tts_provider.into(),
                    ..Default::default()
                },
                started_at: std::time::Instant::now(),
            }),
        }
    }

    pub fn add_stt_usage(&self, seconds: f64) {
        let mut inner = self.inner.lock();
        if inner.record.sealed {
            return;
        }
        inner.record.stt_seconds += seconds;
    }

    pub fn add_llm_usage(&self, input_tokens: u64, output_tokens: u64) {
        let mut inner = self.inner.lock();
        if inner.record.sealed {
            return;
        }
        inner.record.llm_input_tokens += input_tokens;
        inner.record.llm_output_tokens += output_tokens;
    }

    pub fn add_tts_usage(&self, chars: u64) {
        let mut inner = self.inner.lock();
        if inner.record.sealed {
            return;
        }
        inner.record.tts_chars += chars;
    }

    /// Seal the record. Idempotent: repeated calls return the same record.
    pub fn end_call(&self) -> UsageRecord {
        let mut inner = self.inner.lock();
        if !inner.record.sealed {
            inner.record.sealed = true;
            let duration_ms = inner.started_at.elapsed().as_millis() as u64;
            TraceEvent::SessionEnded {
                session_id: inner.record.session_id.clone(),
                duration_ms,
                reason: "usage_finalized".to_string(),
            }
            .emit();
        }
        inner.record.clone()
    }

    pub fn snapshot(&self) -> UsageRecord {
        self.inner.lock().record.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulators_are_monotonic_and_end_call_is_idempotent() {
        let tracker = UsageTracker::start_call("sess-1", "deepgram", "elevenlabs");
        tracker.add_stt_usage(1.5);
        tracker.add_llm_usage(10, 20);
        tracker.add_tts_usage(9);
        tracker.add_stt_usage(0.5);

        let first = tracker.end_call();
        assert_eq!(first.stt_seconds, 2.0);
        assert_eq!(first.llm_input_tokens, 10);
        assert_eq!(first.llm_output_tokens, 20);
        assert_eq!(first.tts_chars, 9);
        assert!(first.sealed);

        tracker.add_llm_usage(5, 5);
        let second = tracker.end_call();
        assert_eq!(second.llm_input_tokens, 10);
        assert_eq!(second.llm_output_tokens, 20);
    }

    #[test]
    fn usage_after_end_call_is_ignored() {
        let tracker = UsageTracker::start_call("sess-2", "whisper", "polly");
        let sealed = tracker.end_call();
        assert!(sealed.sealed);
        tracker.add_stt_usage(5.0);
        assert_eq!(tracker.snapshot().stt_seconds, 0.0);
    }
}

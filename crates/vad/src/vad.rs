/// A voice activity detector consumes raw 16-bit PCM frames and reports
/// whether the frame contains speech. `SimpleVad` is an RMS-energy
/// implementation usable without an external model; production deployments
/// can supply a model-backed implementation behind the same trait.
pub trait VoiceActivityDetector: Send + Sync {
    fn process_frame(&mut self, frame: &[i16]) -> bool;
}

/// RMS-energy threshold VAD with frame-count debouncing, matching the
/// fallback detector used when no neural VAD model is available.
pub struct SimpleVad {
    threshold: f32,
    speech_count: u32,
    silence_count: u32,
    is_speaking: bool,
    speech_on_frames: u32,
    silence_off_frames: u32,
}

impl SimpleVad {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            speech_count: 0,
            silence_count: 0,
            is_speaking: false,
            speech_on_frames: 5,
            silence_off_frames: 10,
        }
    }

    fn rms(frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = frame
            .iter()
            .map(|&s| {
                let v = s as f64 / 32768.0;
                v * v
            })
            .sum();
        ((sum_sq / frame.len() as f64).sqrt()) as f32
    }
}

impl VoiceActivityDetector for SimpleVad {
    fn process_frame(&mut self, frame: &[i16]) -> bool {
        let is_speech = Self::rms(frame) > self.threshold;

        if is_speech {
            self.speech_count += 1;
            self.silence_count = 0;
            if !self.is_speaking && self.speech_count > self.speech_on_frames {
                self.is_speaking = true;
            }
        } else {
            self.silence_count += 1;
            if self.is_speaking && self.silence_count > self.silence_off_frames {
                self.is_speaking = false;
                self.speech_count = 0;
            }
        }

        self.is_speaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame() -> Vec<i16> {
        vec![20000; 160]
    }

    fn quiet_frame() -> Vec<i16> {
        vec![0; 160]
    }

    #[test]
    fn debounces_speech_start() {
        let mut vad = SimpleVad::new(0.02);
        for _ in 0..5 {
            assert!(!vad.process_frame(&loud_frame()));
        }
        assert!(vad.process_frame(&loud_frame()));
        assert!(vad.is_speaking);
    }

    #[test]
    fn debounces_speech_end() {
        let mut vad = SimpleVad::new(0.02);
        for _ in 0..6 {
            vad.process_frame(&loud_frame());
        }
        assert!(vad.is_speaking);
        for _ in 0..10 {
            assert!(vad.process_frame(&quiet_frame()));
        }
        assert!(!vad.process_frame(&quiet_frame()));
        assert!(!vad.is_speaking);
    }
}

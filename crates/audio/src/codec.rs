use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("audio buffer length {0} is not a multiple of 2 (16-bit PCM samples)")]
    UnalignedPcmBuffer(usize),
}

const MULAW_BIAS: i32 = 33;
const MULAW_MAX: i32 = 32635;

/// Decode µ-law encoded audio to linear 16-bit PCM samples.
pub fn mulaw_to_pcm16(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&byte| mulaw_byte_to_pcm(byte)).collect()
}

fn mulaw_byte_to_pcm(mulaw_byte: u8) -> i16 {
    let value = !mulaw_byte as i32 & 0xFF;
    let sign = (value >> 7) & 1;
    let exponent = (value >> 4) & 0x07;
    let mantissa = value & 0x0F;

    let mut sample = ((mantissa << 3) + MULAW_BIAS) << exponent;
    sample -= MULAW_BIAS;
    if sign != 0 {
        sample = -sample;
    }
    sample.clamp(-32768, 32767) as i16
}

/// Encode linear 16-bit PCM samples to µ-law.
pub fn pcm16_to_mulaw(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().map(|&s| pcm_sample_to_mulaw(s)).collect()
}

fn pcm_sample_to_mulaw(sample: i16) -> u8 {
    let sign: i32 = if sample < 0 { 1 } else { 0 };
    let mut magnitude = (sample as i32).unsigned_abs() as i32;
    magnitude = magnitude.min(MULAW_MAX) + MULAW_BIAS;

    let mut exponent = 7;
    for exp in (0..=7).rev() {
        if magnitude >= (1 << (exp + 3)) {
            exponent = exp;
            break;
        }
    }
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;
    let mulaw_value = ((sign << 7) | (exponent << 4) | mantissa) as u8;
    !mulaw_value
}

/// Decode raw little-endian 16-bit PCM bytes into samples.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::UnalignedPcmBuffer(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Encode 16-bit PCM samples into little-endian bytes.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Wrap raw PCM samples in a canonical 44-byte RIFF/WAVE header.
pub fn pcm16_to_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data = pcm16_to_bytes(samples);
    let data_size = data.len() as u32;

    let mut out = Vec::with_capacity(44 + data.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(&data);
    out
}

/// Strip a 44-byte RIFF header if present, returning the raw PCM payload.
pub fn wav_to_pcm16(wav: &[u8]) -> Result<Vec<i16>, CodecError> {
    let payload = if wav.len() > 44 && &wav[0..4] == b"RIFF" {
        &wav[44..]
    } else {
        wav
    };
    bytes_to_pcm16(payload)
}

/// Linear-interpolation resampling between arbitrary sample rates.
pub fn resample_pcm16(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_length = (samples.len() as f64 * ratio) as usize;

    let mut resampled = Vec::with_capacity(new_length);
    for i in 0..new_length {
        let src_idx = i as f64 / ratio;
        let idx = src_idx as usize;
        let frac = src_idx - idx as f64;

        let sample = if idx >= samples.len() - 1 {
            samples[samples.len() - 1] as f64
        } else {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        };
        resampled.push(sample.round().clamp(-32768.0, 32767.0) as i16);
    }
    resampled
}

/// Duration in seconds of a raw PCM buffer at the given format.
pub fn duration_seconds(byte_len: usize, sample_rate: u32, bits_per_sample: u32, channels: u32) -> f64 {
    let bytes_per_sample = bits_per_sample / 8;
    let bytes_per_second = sample_rate * channels * bytes_per_sample;
    byte_len as f64 / bytes_per_second as f64
}

//! WAV helpers for file replay and HTTP backends.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use crate::{SttError, STT_SAMPLE_RATE};

/// Resample audio using linear interpolation.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate || from_rate == 0 {
        return Cow::Borrowed(samples);
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    Cow::Owned(output)
}

/// Read a WAV file and return mono f32 samples at 16kHz.
///
/// Integer and float WAVs of any channel count are accepted; channels are
/// averaged.
pub fn read_wav_mono_f32_16k(path: &Path) -> crate::Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(resample_linear(&mono, spec.sample_rate, STT_SAMPLE_RATE).into_owned())
}

/// Encode normalized mono samples as an in-memory 16-bit WAV file.
pub fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> crate::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|_| SttError::InvalidAudioFormat)?;
        for &sample in samples {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|_| SttError::InvalidAudioFormat)?;
        }
        writer.finalize().map_err(|_| SttError::InvalidAudioFormat)?;
    }
    Ok(cursor.into_inner())
}

/// Clamp a normalized sample into the PCM16 range.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

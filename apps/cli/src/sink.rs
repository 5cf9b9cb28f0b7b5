use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parley_stt::wav::{resample_linear, to_pcm16};
use parley_tts::{AudioFrame, AudioSink, TtsError};

type Writer = hound::WavWriter<BufWriter<File>>;

/// Appends everything the assistant says to one mono 16-bit WAV file.
///
/// The file is created on the first frame, at that frame's sample rate.
/// Later frames at another rate are resampled.
pub struct WavFileSink {
    path: PathBuf,
    writer: Mutex<Option<(Writer, u32)>>,
    closed: Mutex<bool>,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalize the WAV header. Safe to call more than once.
    pub fn close(&self) -> anyhow::Result<()> {
        *lock(&self.closed) = true;
        if let Some((writer, _)) = lock(&self.writer).take() {
            writer.finalize()?;
            tracing::info!(path = %self.path.display(), "Speech written");
        }
        Ok(())
    }

    fn write(&self, frame: &AudioFrame) -> Result<(), hound::Error> {
        let mut slot = lock(&self.writer);
        if slot.is_none() {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: frame.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            *slot = Some((hound::WavWriter::create(&self.path, spec)?, frame.sample_rate));
        }
        let Some((writer, rate)) = slot.as_mut() else {
            return Ok(());
        };
        for &sample in resample_linear(&frame.samples, frame.sample_rate, *rate).iter() {
            writer.write_sample(to_pcm16(sample))?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl AudioSink for WavFileSink {
    async fn play(&self, frame: &AudioFrame) -> parley_tts::Result<()> {
        if *lock(&self.closed) {
            return Ok(());
        }
        self.write(frame)
            .map_err(|e| TtsError::PlaybackFailed(e.to_string()))
    }

    async fn finish(&self) -> parley_tts::Result<()> {
        if let Some((writer, _)) = lock(&self.writer).as_mut() {
            writer
                .flush()
                .map_err(|e| TtsError::PlaybackFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Writes are synchronous, so nothing is left in flight to cancel.
    async fn stop(&self) {
        tracing::debug!(path = %self.path.display(), "Playback stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_appended_to_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let sink = WavFileSink::new(&path);

        sink.play(&AudioFrame::new(vec![0.5; 240], 24000)).await.unwrap();
        sink.finish().await.unwrap();
        sink.play(&AudioFrame::new(vec![-0.5; 240], 24000)).await.unwrap();
        sink.stop().await;
        sink.close().unwrap();
        sink.close().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 480);
        assert!(samples[0] > 0);
        assert!(samples[479] < 0);
    }

    #[tokio::test]
    async fn test_mismatched_rate_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let sink = WavFileSink::new(&path);

        sink.play(&AudioFrame::new(vec![0.1; 100], 16000)).await.unwrap();
        sink.play(&AudioFrame::new(vec![0.1; 200], 32000)).await.unwrap();
        sink.close().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 200);
    }

    #[tokio::test]
    async fn test_nothing_played_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::new(dir.path().join("out.wav"));
        sink.close().unwrap();
        sink.play(&AudioFrame::new(vec![0.1; 10], 16000)).await.unwrap();
        assert!(!sink.path().exists());
    }
}

use std::sync::Arc;

use futures::stream::BoxStream;

use crate::Result;

/// One synthesized block of mono samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Turns one synthesis unit into a lazy sequence of frames.
///
/// Each call starts a fresh synthesis; dropping the stream abandons it.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> BoxStream<'static, Result<AudioFrame>>;
}

/// Playback target for synthesized frames.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    /// Queue a frame for playback.
    async fn play(&self, frame: &AudioFrame) -> Result<()>;

    /// Wait until everything queued has been played.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }

    /// Stop playback and drop anything queued. Safe to call when idle.
    async fn stop(&self);
}

/// Sink that discards audio.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _frame: &AudioFrame) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 2400], 24000);
        assert_eq!(frame.duration_ms(), 100);
        assert_eq!(AudioFrame::new(vec![0.0; 10], 0).duration_ms(), 0);
    }

    #[tokio::test]
    async fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        sink.play(&AudioFrame::new(vec![0.5; 4], 16000)).await.unwrap();
        sink.finish().await.unwrap();
        sink.stop().await;
        sink.stop().await;
    }
}

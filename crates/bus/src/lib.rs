//! Ordered audio ingestion queue.
//!
//! The microphone producer pushes fixed-size normalized frames; the single
//! chunk consumer receives them in arrival order. The producer never waits on
//! the consumer: when the queue is full the newest chunk is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Standard audio sample rate for the turn pipeline (16kHz).
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of each audio chunk in milliseconds.
pub const CHUNK_DURATION_MS: u32 = 600;

/// Number of samples per chunk at the standard sample rate.
pub const CHUNK_SAMPLES: usize = (SAMPLE_RATE as usize * CHUNK_DURATION_MS as usize) / 1000;

/// Default buffer capacity in milliseconds.
pub const DEFAULT_BUFFER_CAPACITY_MS: u32 = 6000;

/// Number of samples in a chunk of `duration_ms` at `sample_rate`.
pub fn samples_per_chunk(sample_rate: u32, duration_ms: u32) -> usize {
    (sample_rate as usize * duration_ms as usize) / 1000
}

/// Convert signed 16-bit PCM into normalized `[-1.0, 1.0)` samples.
pub fn normalize_pcm16(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Convert little-endian PCM16 bytes (as sent by browsers and sound cards)
/// into normalized samples. A trailing odd byte is ignored.
pub fn normalize_pcm16_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Audio chunk with timestamp and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic sequence number for ordering.
    pub seq: u64,
    /// Timestamp in milliseconds (wall clock when chunk was captured).
    pub ts_ms: i64,
    /// Sample rate of the audio data.
    pub sample_rate: u32,
    /// Normalized samples (shared ownership, never mutated).
    pub samples: Arc<[f32]>,
}

impl AudioChunk {
    pub fn new(seq: u64, ts_ms: i64, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            seq,
            ts_ms,
            sample_rate,
            samples: samples.into(),
        }
    }

    /// Duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Configuration for the audio bus.
#[derive(Debug, Clone)]
pub struct AudioBusConfig {
    /// Target buffer capacity in milliseconds.
    pub capacity_ms: u32,
    /// Expected chunk size in milliseconds (for calculating channel capacity).
    pub chunk_size_ms: u32,
}

impl Default for AudioBusConfig {
    fn default() -> Self {
        Self {
            capacity_ms: DEFAULT_BUFFER_CAPACITY_MS,
            chunk_size_ms: CHUNK_DURATION_MS,
        }
    }
}

impl AudioBusConfig {
    /// Channel capacity in number of chunks.
    fn channel_capacity(&self) -> usize {
        if self.chunk_size_ms == 0 {
            return 32;
        }
        ((self.capacity_ms / self.chunk_size_ms) as usize).max(8)
    }
}

/// Sender half of the audio bus, held by the ingestion producer.
#[derive(Clone)]
pub struct AudioBusSender {
    tx: mpsc::Sender<AudioChunk>,
    seq_counter: Arc<AtomicU64>,
    dropped_chunks: Arc<AtomicU64>,
}

impl AudioBusSender {
    /// Send an audio chunk, dropping it if the queue is full.
    ///
    /// Returns true if sent successfully, false if dropped.
    pub fn send(&self, ts_ms: i64, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let chunk = AudioChunk::new(seq, ts_ms, sample_rate, samples);

        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_chunks.fetch_add(1, Ordering::Relaxed) + 1;
                // Only log every 10th drop
                if dropped % 10 == 1 {
                    tracing::warn!(dropped, seq, "Audio bus full, dropping chunks");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Audio bus closed");
                false
            }
        }
    }

    /// Send an audio chunk, waiting until space is available.
    ///
    /// Meant for file replay, where back-pressure is harmless.
    pub async fn send_async(
        &self,
        ts_ms: i64,
        sample_rate: u32,
        samples: impl Into<Arc<[f32]>>,
    ) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let chunk = AudioChunk::new(seq, ts_ms, sample_rate, samples);

        match self.tx.send(chunk).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Audio bus closed");
                false
            }
        }
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

/// Receiver half of the audio bus, held by the chunk consumer.
pub struct AudioBusReceiver {
    rx: mpsc::Receiver<AudioChunk>,
    next_seq: u64,
    gaps_detected: u64,
}

impl AudioBusReceiver {
    /// Receive the next audio chunk. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<AudioChunk> {
        let chunk = self.rx.recv().await?;
        self.track_sequence(&chunk);
        Some(chunk)
    }

    /// Try to receive a chunk without waiting.
    pub fn try_recv(&mut self) -> Option<AudioChunk> {
        let chunk = self.rx.try_recv().ok()?;
        self.track_sequence(&chunk);
        Some(chunk)
    }

    /// Number of chunks the producer dropped before they reached this receiver.
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    fn track_sequence(&mut self, chunk: &AudioChunk) {
        if chunk.seq > self.next_seq {
            let gap = chunk.seq - self.next_seq;
            self.gaps_detected += gap;
            tracing::debug!(
                gap,
                expected = self.next_seq,
                got = chunk.seq,
                "Audio bus gap detected"
            );
        }
        self.next_seq = chunk.seq + 1;
    }
}

/// Per-assistant ingestion queue.
pub struct AudioBus {
    sender: AudioBusSender,
    receiver: Option<AudioBusReceiver>,
}

impl AudioBus {
    pub fn new() -> Self {
        Self::with_config(AudioBusConfig::default())
    }

    pub fn with_config(config: AudioBusConfig) -> Self {
        let capacity = config.channel_capacity();
        let (tx, rx) = mpsc::channel(capacity);

        tracing::debug!(
            "Created audio bus: capacity={}ms (~{} chunks of {}ms)",
            config.capacity_ms,
            capacity,
            config.chunk_size_ms
        );

        Self {
            sender: AudioBusSender {
                tx,
                seq_counter: Arc::new(AtomicU64::new(0)),
                dropped_chunks: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(AudioBusReceiver {
                rx,
                next_seq: 0,
                gaps_detected: 0,
            }),
        }
    }

    pub fn sender(&self) -> AudioBusSender {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<AudioBusReceiver> {
        self.receiver.take()
    }
}

impl Default for AudioBus {
    fn default() -> Self {
        Self::new()
    }
}

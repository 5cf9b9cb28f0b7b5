//! `parley`: replay a recorded WAV through the voice assistant.
//!
//! Transcription and speech go through an OpenAI-compatible server, answers
//! through Ollama. Speech is written to `--output` when given.

mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parley_application::{AssistantConfig, VoiceAssistant};
use parley_bus::AudioBusSender;
use parley_events::TracingEventBus;
use parley_llm::{OllamaGenerator, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use parley_openai::{OpenAiConfig, OpenAiSpeech, OpenAiTranscriber, DEFAULT_OPENAI_URL};
use parley_stt::wav::{read_wav_mono_f32_16k, resample_linear};
use parley_stt::STT_SAMPLE_RATE;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::sink::WavFileSink;

#[derive(Parser, Debug)]
#[command(name = "parley", about = "Spoken dialogue over a recorded conversation")]
struct Args {
    /// WAV file replayed as microphone input
    #[arg(long, short)]
    input: PathBuf,

    /// Write the assistant's speech to this WAV file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JSON assistant configuration
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Pace the input at real time instead of as fast as the pipeline takes it
    #[arg(long)]
    realtime: bool,

    #[arg(long, env = "PARLEY_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    #[arg(long, env = "PARLEY_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    model: String,

    #[arg(long, env = "PARLEY_OPENAI_URL", default_value = DEFAULT_OPENAI_URL)]
    openai_url: String,

    #[arg(long, env = "PARLEY_OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Transcribe in this language instead of detecting it (ISO 639-1)
    #[arg(long)]
    language: Option<String>,
}

/// How the input file is cut into bus chunks.
struct Replay {
    chunk_samples: usize,
    chunk_ms: u32,
    sample_rate: u32,
    /// Silent chunks appended so the last utterance reaches IDLE.
    trailing_silence: usize,
    realtime: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,parley=debug")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AssistantConfig::from_json_file(path)?,
        None => AssistantConfig::default(),
    };

    let openai = OpenAiConfig {
        base_url: args.openai_url.clone(),
        api_key: args.openai_api_key.clone(),
        ..OpenAiConfig::default()
    };
    let mut transcriber = OpenAiTranscriber::new(openai.clone())?;
    if let Some(language) = &args.language {
        parley_stt::StreamingTranscriber::set_language(&mut transcriber, language);
    }
    let speech = OpenAiSpeech::new(openai)?;
    let generator = OllamaGenerator::new(args.ollama_url.clone(), args.model.clone());
    let output = args.output.as_ref().map(|path| Arc::new(WavFileSink::new(path)));
    #[cfg(feature = "silero")]
    let vad = parley_vad::SileroVad::new(config.audio.sample_rate)?;

    let mut builder = VoiceAssistant::builder(config)
        .streaming_transcriber(transcriber.clone())
        .final_transcriber(transcriber)
        .answer_generator(Arc::new(generator))
        .speech_synthesizer(Arc::new(speech))
        .event_bus(Arc::new(TracingEventBus));
    if let Some(sink) = &output {
        builder = builder.audio_sink(sink.clone());
    }
    #[cfg(feature = "silero")]
    {
        builder = builder.vad(vad);
    }
    let assistant = builder.build()?;

    let audio_config = &assistant.config().audio;
    let replay = Replay {
        chunk_samples: audio_config.chunk_samples(),
        chunk_ms: audio_config.chunk_duration_ms,
        sample_rate: audio_config.sample_rate,
        trailing_silence: assistant.config().turn.idle_threshold as usize + 2,
        realtime: args.realtime,
    };

    let samples = read_wav_mono_f32_16k(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let samples = resample_linear(&samples, STT_SAMPLE_RATE, replay.sample_rate).into_owned();
    tracing::info!(
        input = %args.input.display(),
        seconds = samples.len() as f32 / replay.sample_rate as f32,
        model = %args.model,
        "Replaying conversation"
    );

    let mut handle = assistant.start();
    let audio = handle
        .audio_sender()
        .context("assistant input already closed")?;
    handle.close_input();

    let shutdown = handle.shutdown_token();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, shutting down");
                shutdown.cancel();
            }
        }
    });

    let sent = replay_audio(audio, &samples, &replay, &shutdown).await;
    tracing::debug!(chunks = sent, "Input exhausted, waiting for the last turn");
    handle.join().await?;

    if let Some(sink) = output {
        sink.close()?;
    }
    Ok(())
}

/// Push the recording onto the bus chunk by chunk, then trailing silence.
/// Returns how many chunks were sent.
async fn replay_audio(
    audio: AudioBusSender,
    samples: &[f32],
    replay: &Replay,
    shutdown: &CancellationToken,
) -> usize {
    let silence = vec![0.0; replay.chunk_samples];
    let chunks = samples
        .chunks(replay.chunk_samples)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(replay.chunk_samples, 0.0);
            chunk
        })
        .chain(std::iter::repeat(silence).take(replay.trailing_silence));

    let mut pacer = tokio::time::interval(Duration::from_millis(replay.chunk_ms as u64));
    let mut sent = 0;
    for (index, chunk) in chunks.enumerate() {
        if replay.realtime {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = pacer.tick() => {}
            }
        } else if shutdown.is_cancelled() {
            break;
        }
        let ts_ms = index as i64 * replay.chunk_ms as i64;
        if !audio.send_async(ts_ms, replay.sample_rate, chunk).await {
            break;
        }
        sent += 1;
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_language_flag_documents_transcription() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("Transcribe in this language"));
    }

    #[test]
    fn test_language_flag_parsed() {
        let args = Args::try_parse_from(["parley", "--input", "in.wav", "--language", "es"]).unwrap();
        assert_eq!(args.language.as_deref(), Some("es"));
        assert_eq!(args.input, PathBuf::from("in.wav"));
        assert!(!args.realtime);
    }
}

//! `linevox` binary: a stand-in host pipeline that runs the detection
//! engine over a WAV file, printing the events a live collector would
//! receive. The engine's lifecycle API (start/stop/status) is exercised
//! exactly as an embedding media server would drive it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use linevox_engine::{
    DetectionEngine, EngineStatus, NotificationTransport, RecordingSink, StartOutcome,
    WirePayload,
};
use linevox_foundation::{
    Clock, GlobalConfig, Leg, NotifyError, RealClock, RecordingFormat, SinkError, VirtualClock,
};

#[derive(Parser)]
#[command(
    name = "linevox",
    version,
    about = "Streaming voice-activity detection and speech segmentation"
)]
struct Cli {
    /// TOML configuration file; defaults plus LINEVOX_* environment apply
    /// when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run detection over a 16-bit PCM WAV file.
    Analyze {
        wav: PathBuf,

        #[arg(long, default_value = "wav-analysis")]
        session_id: String,

        /// Runtime overrides, e.g. -p hits=3 -p leg=both
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Print the resolved configuration as TOML.
    PrintConfig,
}

/// Recording sink that only logs; the real sink belongs to the host.
struct LogSink;

impl RecordingSink for LogSink {
    fn start(
        &self,
        session_id: &str,
        file_path: &str,
        format: RecordingFormat,
    ) -> Result<(), SinkError> {
        tracing::info!(session_id, file_path, %format, "host sink: recording start");
        Ok(())
    }

    fn stop(&self, session_id: &str) -> Result<(), SinkError> {
        tracing::info!(session_id, "host sink: recording stop");
        Ok(())
    }
}

/// Prints each event as a JSON line instead of POSTing it, used when no
/// collector endpoint is configured.
struct StdoutTransport;

#[async_trait]
impl NotificationTransport for StdoutTransport {
    async fn deliver(&self, payload: &WirePayload) -> Result<(), NotifyError> {
        let line =
            serde_json::to_string(payload).map_err(|e| NotifyError::Transport(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "linevox.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        // stderr keeps stdout clean for the JSON event stream
        .with_writer(std::io::stderr.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let config = GlobalConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            wav,
            session_id,
            params,
        } => analyze(config, &wav, &session_id, &params).await,
        Commands::PrintConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn analyze(
    mut config: GlobalConfig,
    wav: &Path,
    session_id: &str,
    params: &[String],
) -> anyhow::Result<()> {
    let mut reader =
        hound::WavReader::open(wav).with_context(|| format!("failed to open {}", wav.display()))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        bail!(
            "only 16-bit integer PCM input is supported, got {}-bit {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    // Negotiate 20 ms frames at the file's sample rate, as a telephony host
    // would.
    config.sample_rate_hz = spec.sample_rate;
    config.frame_size_samples = (spec.sample_rate / 50) as usize;
    let frame_duration = Duration::from_millis(config.frame_duration_ms());

    let samples = read_mono_samples(&mut reader, spec.channels)?;
    tracing::info!(
        file = %wav.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        frame_size = config.frame_size_samples,
        "analyzing"
    );

    // Frames are fed faster than real time, so detection time advances on a
    // virtual clock, one frame duration per frame.
    let clock = Arc::new(VirtualClock::starting_at(RealClock::new().unix_seconds()));

    let mut builder = DetectionEngine::builder(config.clone(), Arc::new(LogSink))
        .with_clock(clock.clone());
    if config.api_url.is_none() {
        builder = builder.with_transport(Arc::new(StdoutTransport));
    }
    let engine = builder.build()?;

    let overrides = params.join(" ");
    match engine.start_session(session_id, &overrides)? {
        StartOutcome::Started => {}
        StartOutcome::AlreadyActive => bail!("session {session_id} already active"),
    }

    for frame in samples.chunks(config.frame_size_samples) {
        engine.process_frame(session_id, Leg::A, frame);
        clock.advance(frame_duration);
    }

    print_status(&engine.status());

    engine.stop_session(session_id)?;
    engine.shutdown().await;
    Ok(())
}

fn read_mono_samples<R: Read>(
    reader: &mut hound::WavReader<R>,
    channels: u16,
) -> anyhow::Result<Vec<i16>> {
    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    let samples = samples.context("failed to decode WAV samples")?;

    if channels <= 1 {
        return Ok(samples);
    }

    // Average interleaved channels down to mono.
    let channels = channels as usize;
    Ok(samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect())
}

fn print_status(status: &EngineStatus) {
    for s in &status.sessions {
        println!(
            "Session: {}, Leg: {}, Voice: {}, Recording: {}, Frames: {}, Energy: {:.3}, Max Silence: {}ms",
            s.session_id,
            s.leg,
            if s.voice_confirmed { "YES" } else { "NO" },
            if s.is_recording { "YES" } else { "NO" },
            s.frames_seen,
            s.energy_threshold,
            s.max_silence_ms
        );
    }
    println!("Total monitored sessions: {}", status.sessions.len());
    println!(
        "Auto-recording: {}",
        if status.auto_record { "enabled" } else { "disabled" }
    );
    println!("Recording path: {}", status.recording_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn stereo_input_averages_to_mono() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[1000, -1000, 600, 400, -200, -400]);
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();

        let mono = read_mono_samples(&mut reader, 2).unwrap();
        assert_eq!(mono, vec![0, 500, -300]);
    }

    #[test]
    fn mono_input_passes_through() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[1, 2, 3]);
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();

        assert_eq!(read_mono_samples(&mut reader, 1).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn analyze_runs_a_wav_end_to_end() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // 200 ms of loud tone followed by 2.5 s of silence: one confirmed
        // span that ends by max-silence before the file runs out.
        let mut samples = vec![8000i16; 1600];
        samples.extend(std::iter::repeat(0i16).take(20000));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(spec, &samples)).unwrap();

        let config = GlobalConfig {
            auto_record: false,
            ..Default::default()
        };
        analyze(config, &path, "test-session", &[]).await.unwrap();
    }
}

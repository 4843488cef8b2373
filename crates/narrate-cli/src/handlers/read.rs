//! Read command handler.
//!
//! Wires an HTTP synthesiser and an output device into a reader, starts one
//! session, and follows its events until it stops. Ctrl-C stops the read.
//! When the text comes from a file, stdin stays free for playback controls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use narrate_core::{
    PlayerState, ReaderEvent, ReaderSettings, RecordedAudio, SettingsStore, SettingsUpdate,
};
use narrate_speech::{
    FileDevice, HttpSynthesizer, IssuancePolicy, PlaybackDevice, Reader, ReaderConfig,
    ReaderHandle,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::ReadArgs;
use crate::utils::input::{Control, load_text, parse_control, segmenter_config};

pub async fn execute(args: ReadArgs) -> Result<()> {
    let stored = SettingsStore::open_default()?.load()?;
    let settings = resolve_settings(stored, &args);
    let config = ReaderConfig {
        segmenter: segmenter_config(&args.text)?,
        policy: IssuancePolicy {
            request_timeout: request_timeout(args.request_timeout)?,
            ..IssuancePolicy::default()
        },
        ..ReaderConfig::default()
    };

    let text = load_text(&args.text).await?;
    let device = open_device(args.output_dir.clone())?;
    let reader = Reader::spawn(config, Arc::new(HttpSynthesizer::new()), device);

    let outcome = follow(&reader, text, settings, &args).await;
    reader.shutdown();
    outcome
}

/// Flags (and their `NARRATE_*` env vars) win over the settings file.
pub fn resolve_settings(mut settings: ReaderSettings, args: &ReadArgs) -> ReaderSettings {
    settings.merge(&SettingsUpdate {
        endpoint_url: args.endpoint.clone(),
        voice: args.voice.clone(),
        speed: args.speed,
        model: args.model.clone(),
        record_output: args.record.as_ref().map(|_| true),
        chunking_enabled: args.no_chunking.then_some(false),
    });
    settings
}

fn request_timeout(secs: Option<f64>) -> Result<Option<Duration>> {
    secs.map(|s| {
        Duration::try_from_secs_f64(s)
            .ok()
            .filter(|d| !d.is_zero())
            .with_context(|| format!("Invalid request timeout: {s}"))
    })
    .transpose()
}

fn open_device(output_dir: Option<PathBuf>) -> Result<Box<dyn PlaybackDevice>> {
    if let Some(dir) = output_dir {
        return Ok(Box::new(FileDevice::new(dir)));
    }

    #[cfg(feature = "speaker")]
    {
        let device = narrate_speech::RodioDevice::spawn().context("Failed to open audio output")?;
        Ok(Box::new(device))
    }

    #[cfg(not(feature = "speaker"))]
    {
        bail!("This build has no audio output; pass --output-dir to write chunks to disk")
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

async fn follow(
    reader: &ReaderHandle,
    text: String,
    settings: ReaderSettings,
    args: &ReadArgs,
) -> Result<()> {
    let mut events = reader.subscribe();
    let session = reader.start(text, settings).await?;
    tracing::debug!(session_id = %session, "Read started");

    let pb = progress_bar();
    let mut failure: Option<String> = None;

    // Only listen for controls when stdin is not the text source.
    let mut controls = args
        .text
        .file
        .is_some()
        .then(|| BufReader::new(tokio::io::stdin()).lines());
    if controls.is_some() {
        pb.println("Controls: p = pause, r = resume, s = stop, t = time, stats, seek <secs>");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ReaderEvent::StateChanged { state }) => {
                    pb.set_message(state.to_string());
                    if state == PlayerState::Stopped {
                        break;
                    }
                }
                Ok(ReaderEvent::SegmentStarted { index, total, .. }) => {
                    pb.set_length(total as u64);
                    pb.set_position(index as u64 + 1);
                }
                Ok(ReaderEvent::RecordingAvailable { recording, .. }) => {
                    if let Some(path) = &args.record {
                        save_recording(path, &recording).await?;
                        pb.println(format!("Saved recording to {}", path.display()));
                    }
                }
                Ok(ReaderEvent::Error { message }) => {
                    pb.println(format!("Error: {message}"));
                    failure = Some(message);
                }
                Ok(ReaderEvent::StreamComplete { .. }) => {
                    pb.set_position(pb.length().unwrap_or_default());
                }
                Ok(ReaderEvent::TimeUpdate { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event display fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                pb.println("Stopping...");
                reader.stop().await?;
            }
            line = next_line(&mut controls) => match line {
                Some(line) => control(reader, &pb, &line).await,
                None => controls = None,
            },
        }
    }

    pb.finish_and_clear();
    match failure {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

async fn next_line(
    controls: &mut Option<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
) -> Option<String> {
    match controls {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

async fn control(reader: &ReaderHandle, pb: &ProgressBar, line: &str) {
    let Some(control) = parse_control(line) else {
        pb.println(format!("Unknown control: {}", line.trim()));
        return;
    };

    let result = match control {
        Control::Pause => reader.pause().await,
        Control::Resume => reader.resume().await,
        Control::Stop => reader.stop().await,
        Control::Seek(position) => reader.seek(position).await,
        Control::Time => {
            match reader.time_info().await {
                Some(info) => pb.println(format!(
                    "{:.1}s / {}",
                    info.current_time,
                    info.duration
                        .map_or_else(|| "?".to_string(), |d| format!("{d:.1}s"))
                )),
                None => pb.println("Nothing playing"),
            }
            Ok(())
        }
        Control::Stats => reader.playback_stats().await.map(|stats| {
            match serde_json::to_string(&stats) {
                Ok(json) => pb.println(json),
                Err(e) => pb.println(format!("Failed to encode stats: {e}")),
            }
        }),
    };

    if let Err(e) = result {
        pb.println(format!("{e}"));
    }
}

async fn save_recording(path: &Path, recording: &RecordedAudio) -> Result<()> {
    tokio::fs::write(path, &recording.bytes)
        .await
        .with_context(|| format!("Failed to write recording to {}", path.display()))
}

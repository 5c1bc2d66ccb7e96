//! Command runners for the audio subcommands

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration as StdDuration;

use log::LevelFilter;

use crate::application::ports::{CaptureDevice, ConfigStore, PlaybackDevice};
use crate::application::{AudioController, ControllerConfig};
use crate::domain::config::AppConfig;
use crate::domain::Duration;
use crate::infrastructure::XdgConfigStore;

use super::presenter::Presenter;
use super::signals::{StopReason, StopSignal};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable overriding the recording buffer path
pub const ENV_WAV_FILE: &str = "VOICE_IO_WAV_FILE";

/// Audio subcommands, with arguments already parsed
#[derive(Debug, Clone)]
pub enum AudioCommand {
    Record {
        duration: Option<Duration>,
        output: Option<PathBuf>,
    },
    Play {
        file: PathBuf,
    },
    Echo {
        duration: Duration,
    },
}

/// Initialize logging: warn for everything, debug for this crate with `-v`.
/// `RUST_LOG` still applies on top.
pub fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    if verbose {
        builder.filter_module("voice_io", LevelFilter::Debug);
    }
    builder.parse_default_env();
    builder.format_timestamp_millis().init();
}

/// Load and merge configuration from file, env, and CLI
pub fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().unwrap_or_else(|e| {
        log::warn!("Ignoring config file {}: {}", store.path().display(), e);
        AppConfig::empty()
    });

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Config values taken from the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        wav_file: env::var(ENV_WAV_FILE).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Parse an optional duration argument
pub fn parse_duration(value: Option<&str>) -> Result<Option<Duration>, String> {
    value
        .map(|s| s.parse::<Duration>().map_err(|e| e.to_string()))
        .transpose()
}

/// Build a controller for `config`, run `command` on it, then shut it down
pub fn run_audio_command<C, P>(
    command: AudioCommand,
    config: ControllerConfig,
    capture: C,
    playback: P,
) -> ExitCode
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    let mut presenter = Presenter::new();

    let signal = match StopSignal::new() {
        Ok(signal) => signal,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let controller = match AudioController::new(config, capture, playback) {
        Ok(controller) => controller,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let result = match command {
        AudioCommand::Record { duration, output } => {
            run_record(&controller, &signal, &mut presenter, duration, output.as_deref())
        }
        AudioCommand::Play { file } => run_play(&controller, &signal, &mut presenter, &file),
        AudioCommand::Echo { duration } => run_echo(&controller, &signal, &mut presenter, duration),
    };

    controller.shutdown();

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(message) => {
            presenter.error(&message);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Record until Enter, Ctrl+C or `duration`, then report the buffer
fn run_record<C, P>(
    controller: &AudioController<C, P>,
    signal: &StopSignal,
    presenter: &mut Presenter,
    duration: Option<Duration>,
    output: Option<&Path>,
) -> Result<(), String>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    let reason = capture(controller, signal, presenter, duration)?;
    if reason == StopReason::Interrupted {
        presenter.info("Recording stopped by Ctrl+C");
    }

    let recording = controller.last_recording().map_err(|e| e.to_string())?;
    presenter.info(&format!("Recording buffer: {}", controller.wav_path().display()));

    if let Some(output) = output {
        std::fs::write(output, recording.data())
            .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
        presenter.success(&format!("Saved to {}", output.display()));
    }

    presenter.output(&presenter.describe_recording(&recording));
    Ok(())
}

/// Play a WAV file and wait for it to finish
fn run_play<C, P>(
    controller: &AudioController<C, P>,
    signal: &StopSignal,
    presenter: &mut Presenter,
    file: &Path,
) -> Result<(), String>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    let bytes =
        std::fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    play_and_wait(controller, signal, presenter, bytes, &file.display().to_string())
}

/// Record for `duration`, then play the recording back
fn run_echo<C, P>(
    controller: &AudioController<C, P>,
    signal: &StopSignal,
    presenter: &mut Presenter,
    duration: Duration,
) -> Result<(), String>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    if capture(controller, signal, presenter, Some(duration))? == StopReason::Interrupted {
        return Err("Cancelled".to_string());
    }

    let recording = controller.last_recording().map_err(|e| e.to_string())?;
    if recording.is_empty() {
        return Err("Nothing was recorded".to_string());
    }
    play_and_wait(controller, signal, presenter, recording.into_data(), "recording")
}

/// Run one capture session with a progress spinner
fn capture<C, P>(
    controller: &AudioController<C, P>,
    signal: &StopSignal,
    presenter: &mut Presenter,
    duration: Option<Duration>,
) -> Result<StopReason, String>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    controller.start_recording().map_err(|e| e.to_string())?;
    if !controller.is_recording() {
        return Err("Failed to start recording: capture device is in use".to_string());
    }

    let limit = duration.map(|d| d.as_std());
    let message = match limit {
        Some(limit) => format!(
            "Recording... {}",
            presenter.format_progress(0, limit.as_millis() as u64)
        ),
        None => "Recording... (press Enter or Ctrl+C to stop)".to_string(),
    };
    presenter.start_spinner(&message);

    let reason = signal.wait(limit, limit.is_none(), |elapsed: StdDuration| {
        if let Some(limit) = limit {
            presenter.update_recording_progress(elapsed.as_millis() as u64, limit.as_millis() as u64);
        }
        controller.is_recording()
    });

    controller.stop_recording();

    if let Some(fault) = controller.take_capture_fault() {
        presenter.spinner_fail("Recording failed");
        return Err(fault.to_string());
    }
    presenter.spinner_success("Recording complete");
    Ok(reason)
}

fn play_and_wait<C, P>(
    controller: &AudioController<C, P>,
    signal: &StopSignal,
    presenter: &mut Presenter,
    bytes: Vec<u8>,
    label: &str,
) -> Result<(), String>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    presenter.start_spinner(&format!("Playing {}...", label));
    let handle = controller.play(bytes);

    match signal.wait_playback(handle) {
        Some(Ok(())) => {
            presenter.spinner_success("Playback complete");
            Ok(())
        }
        Some(Err(e)) => {
            presenter.spinner_fail("Playback failed");
            Err(e.to_string())
        }
        None => {
            presenter.spinner_fail("Playback interrupted");
            Err("Cancelled".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_none() {
        assert_eq!(parse_duration(None).unwrap(), None);
    }

    #[test]
    fn parse_duration_parses_value() {
        let parsed = parse_duration(Some("1s250ms")).unwrap().unwrap();
        assert_eq!(parsed.as_millis(), 1_250);
    }

    #[test]
    fn parse_duration_reports_bad_input() {
        let err = parse_duration(Some("soon")).unwrap_err();
        assert!(err.starts_with("Invalid duration"));
    }
}

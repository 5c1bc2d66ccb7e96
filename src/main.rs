//! voice-io CLI entry point

use std::process::ExitCode;

use clap::Parser;

use voice_io::application::ControllerConfig;
use voice_io::cli::{
    app::{init_logging, load_merged_config, parse_duration, run_audio_command, AudioCommand},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
    EXIT_ERROR, EXIT_USAGE_ERROR,
};
use voice_io::domain::config::AppConfig;
use voice_io::domain::Duration;
use voice_io::infrastructure::{
    CpalCaptureDevice, RodioPlaybackDevice, SilentPlaybackDevice, SyntheticCaptureDevice,
    XdgConfigStore,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let presenter = Presenter::new();

    // Parse audio subcommands; config is handled directly
    let command = match cli.command {
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter) {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Commands::Record { duration, output } => match parse_duration(duration.as_deref()) {
            Ok(duration) => AudioCommand::Record { duration, output },
            Err(e) => {
                presenter.error(&e);
                return ExitCode::from(EXIT_USAGE_ERROR);
            }
        },
        Commands::Play { file } => AudioCommand::Play { file },
        Commands::Echo { duration } => match duration.parse::<Duration>() {
            Ok(duration) => AudioCommand::Echo { duration },
            Err(e) => {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_USAGE_ERROR);
            }
        },
    };

    // Merge config: defaults < file < env < cli
    let cli_config = AppConfig {
        wav_file: cli
            .wav_file
            .map(|path| path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let config = load_merged_config(cli_config);

    let controller_config = match ControllerConfig::from_app_config(&config) {
        Ok(config) => config,
        Err(e) => {
            presenter.error(&format!("Invalid audio format in config: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    if cli.synthetic {
        run_audio_command(
            command,
            controller_config,
            SyntheticCaptureDevice::new(),
            SilentPlaybackDevice::new(),
        )
    } else {
        run_audio_command(
            command,
            controller_config,
            CpalCaptureDevice::new(),
            RodioPlaybackDevice::new(),
        )
    }
}

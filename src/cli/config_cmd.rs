//! Config command handler

use std::str::FromStr;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter),
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value),
        ConfigAction::Get { key } => handle_get(store, presenter, &key),
        ConfigAction::List => handle_list(store, presenter),
        ConfigAction::Path => handle_path(store, presenter),
    }
}

fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init()?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load()?;
    apply_value(&mut config, key, value)?;

    // Reject combinations that could never open a capture line
    config
        .format_or_default()
        .map_err(|e| ConfigError::ValidationError {
            key: key.to_string(),
            message: e.to_string(),
        })?;

    store.save(&config)?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load()?;
    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output("(not set)"),
    }

    Ok(())
}

fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load()?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &config_value(&config, key).unwrap_or_else(|| "(not set)".to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

/// Parse `value` for `key` and store it in `config`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "wav_file" => {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    key: key.to_string(),
                    message: "Path must not be empty".to_string(),
                });
            }
            config.wav_file = Some(value.to_string());
        }
        "sample_rate" => config.sample_rate = Some(parse_number(key, value)?),
        "bits_per_sample" => config.bits_per_sample = Some(parse_number(key, value)?),
        "channels" => config.channels = Some(parse_number(key, value)?),
        "signed" => config.signed = Some(parse_bool_value(key, value)?),
        "big_endian" => config.big_endian = Some(parse_bool_value(key, value)?),
        "poll_interval_ms" => config.poll_interval_ms = Some(parse_positive(key, value)?),
        "shutdown_timeout_ms" => config.shutdown_timeout_ms = Some(parse_number(key, value)?),
        "worker_threads" => config.worker_threads = Some(parse_positive(key, value)?),
        _ => return check_key(key),
    }
    Ok(())
}

fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "wav_file" => config.wav_file.clone(),
        "sample_rate" => config.sample_rate.map(|v| v.to_string()),
        "bits_per_sample" => config.bits_per_sample.map(|v| v.to_string()),
        "channels" => config.channels.map(|v| v.to_string()),
        "signed" => config.signed.map(|v| v.to_string()),
        "big_endian" => config.big_endian.map(|v| v.to_string()),
        "poll_interval_ms" => config.poll_interval_ms.map(|v| v.to_string()),
        "shutdown_timeout_ms" => config.shutdown_timeout_ms.map(|v| v.to_string()),
        "worker_threads" => config.worker_threads.map(|v| v.to_string()),
        _ => None,
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("'{}' is not a valid number", value),
        })
}

fn parse_positive<T: FromStr + Default + PartialEq>(key: &str, value: &str) -> Result<T, ConfigError> {
    let parsed: T = parse_number(key, value)?;
    if parsed == T::default() {
        return Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Value must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

fn parse_bool_value(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    })
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

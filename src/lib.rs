//! voice-io - microphone capture and WAV playback
//!
//! This crate provides an audio controller for voice-driven hosts: record the
//! microphone into a WAV buffer file, read the buffer back, and play WAV data
//! through the speakers in the background.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Audio formats, recordings, the capture session state machine, config and errors
//! - **Application**: The audio controller and the device/config port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal capture, rodio playback, synthetic devices, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and Ctrl+C handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

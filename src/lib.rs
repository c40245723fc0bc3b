//! ChatVoice - real-time voice capture and playback for chatbot conversations
//!
//! This crate provides a microphone [`Recorder`](application::Recorder) with a
//! live input level meter and a [`Player`](application::Player) for encoded
//! audio replies.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: State machines, value objects, settings, and errors
//! - **Application**: Recorder and player components and the media port traits
//! - **Infrastructure**: Adapter implementations (cpal, rustfft, rodio, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub mod camera;
pub mod config;
pub mod console_display;
pub mod detector;
pub mod error;
pub mod key_mapper;
pub mod lifecycle;
pub mod mixer;
pub mod note_bank;
pub mod overlay;
pub mod perception;
pub mod presentation;
pub mod simulator;
pub mod types;

#[cfg(feature = "audio")]
pub mod audio_out;

#[cfg(feature = "gui")]
pub mod gui;

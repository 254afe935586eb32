//! Recording and playback of microphone takes.
//!
//! The [`RecorderController`] is a small state machine driven by three buttons. It reports every
//! outcome as a [`RecorderNotice`] rather than an error; the audio work is delegated to a
//! [`RecorderBackend`](crate::audio_engine::RecorderBackend).

use std::fmt;

mod controller;
mod library;

pub use controller::RecorderController;
pub use library::{RECORDING_EXTENSION, RecordingLibrary, recording_file_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Ready,
    Recording,
    Playing,
}

/// Status line shown to the user after each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderNotice {
    Ready,
    Recording,
    Playing,
    CannotRecordWhilePlaying,
    CannotPlayWhileRecording,
    CannotDeleteWhileRecording,
    CannotDeleteWhilePlaying,
    NoFilesToPlay,
    NoFilesToRemove,
    ErrorOpeningFile,
    CannotStartRecording,
    CannotRemoveFile,
    DirectoryUnreadable,
}

impl RecorderNotice {
    pub fn message(self) -> &'static str {
        match self {
            RecorderNotice::Ready => "Ready!",
            RecorderNotice::Recording => "Recording...",
            RecorderNotice::Playing => "Playing...",
            RecorderNotice::CannotRecordWhilePlaying => "Cannot record while playing",
            RecorderNotice::CannotPlayWhileRecording => "Cannot play while recording",
            RecorderNotice::CannotDeleteWhileRecording => "Cannot delete while recording",
            RecorderNotice::CannotDeleteWhilePlaying => "Cannot delete while playing",
            RecorderNotice::NoFilesToPlay => "There are no files to play",
            RecorderNotice::NoFilesToRemove => "There are no files to remove",
            RecorderNotice::ErrorOpeningFile => "Error opening file",
            RecorderNotice::CannotStartRecording => "Error: cannot start recording",
            RecorderNotice::CannotRemoveFile => "Error: cannot remove file",
            RecorderNotice::DirectoryUnreadable => "Error: could not open directory",
        }
    }
}

impl fmt::Display for RecorderNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

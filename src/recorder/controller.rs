use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::audio_engine::RecorderBackend;
use crate::audio_engine::constants::PLAYER_VOLUME_MAX;
use crate::recorder::library::{RecordingLibrary, recording_file_name};
use crate::recorder::{RecorderNotice, RecorderState};

/// Record / play / delete state machine over a [`RecordingLibrary`].
///
/// Each action returns the notice to display, or `None` when the status line
/// should stay as it is.
#[derive(Debug)]
pub struct RecorderController {
    state: RecorderState,
    library: RecordingLibrary,
    status: Option<RecorderNotice>,
    player_volume: f32,
}

impl RecorderController {
    /// Creates a controller and scans `directory` once.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let mut controller = Self {
            state: RecorderState::Ready,
            library: RecordingLibrary::new(directory),
            status: None,
            player_volume: 1.0,
        };
        if let Some(notice) = controller.refresh() {
            controller.status = Some(notice);
        }
        controller
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn status(&self) -> Option<RecorderNotice> {
        self.status
    }

    pub fn library(&self) -> &RecordingLibrary {
        &self.library
    }

    pub fn player_volume(&self) -> f32 {
        self.player_volume
    }

    pub fn record_button_label(&self) -> &'static str {
        match self.state {
            RecorderState::Recording => "Stop",
            _ => "Record",
        }
    }

    pub fn play_button_label(&self) -> &'static str {
        match self.state {
            RecorderState::Playing => "Stop",
            _ => "Play",
        }
    }

    /// Record button.
    ///
    /// Starts a take named after `now`, or stops the running one. Refused while playing.
    pub fn record_pressed(
        &mut self,
        backend: &mut dyn RecorderBackend,
        now: NaiveDateTime,
    ) -> Option<RecorderNotice> {
        let notice = match self.state {
            RecorderState::Ready => {
                let directory = self.library.directory().to_path_buf();
                if let Err(err) = fs::create_dir_all(&directory) {
                    log::warn!("Cannot create {}: {}", directory.display(), err);
                }
                let path = directory.join(recording_file_name(now));

                match backend.start_recording(&path) {
                    Ok(()) => {
                        self.state = RecorderState::Recording;
                        RecorderNotice::Recording
                    }
                    Err(err) => {
                        log::warn!("Cannot record to {}: {}", path.display(), err);
                        RecorderNotice::CannotStartRecording
                    }
                }
            }
            RecorderState::Recording => {
                if let Err(err) = backend.stop_recording() {
                    log::warn!("Failed to finish recording: {}", err);
                }
                self.state = RecorderState::Ready;
                self.refresh().unwrap_or(RecorderNotice::Ready)
            }
            RecorderState::Playing => RecorderNotice::CannotRecordWhilePlaying,
        };
        self.notify(Some(notice))
    }

    /// Play button: plays the selected recording, or stops playback.
    pub fn play_pressed(&mut self, backend: &mut dyn RecorderBackend) -> Option<RecorderNotice> {
        let notice = match self.state {
            RecorderState::Ready => match self.library.selected_path() {
                None => RecorderNotice::NoFilesToPlay,
                Some(path) => {
                    if let Err(err) = backend.set_player_volume(self.player_volume) {
                        log::debug!("Player volume not applied: {}", err);
                    }
                    match backend.play_file(path) {
                        Ok(()) => {
                            self.state = RecorderState::Playing;
                            RecorderNotice::Playing
                        }
                        Err(err) => {
                            log::warn!("Error opening {}: {}", path.display(), err);
                            RecorderNotice::ErrorOpeningFile
                        }
                    }
                }
            },
            RecorderState::Playing => {
                if let Err(err) = backend.stop_playback() {
                    log::warn!("Failed to stop playback: {}", err);
                }
                self.state = RecorderState::Ready;
                RecorderNotice::Ready
            }
            RecorderState::Recording => RecorderNotice::CannotPlayWhileRecording,
        };
        self.notify(Some(notice))
    }

    /// Delete button: removes the selected recording while Ready.
    pub fn delete_pressed(&mut self) -> Option<RecorderNotice> {
        let notice = match self.state {
            RecorderState::Ready => {
                if self.library.is_empty() {
                    Some(RecorderNotice::NoFilesToRemove)
                } else {
                    let removed = match self.library.selected_path() {
                        Some(path) => match fs::remove_file(path) {
                            Ok(()) => {
                                log::info!("Removed {}", path.display());
                                true
                            }
                            Err(err) => {
                                log::warn!("Cannot remove {}: {}", path.display(), err);
                                false
                            }
                        },
                        None => false,
                    };

                    let rescan = self.refresh();
                    if removed {
                        rescan
                    } else {
                        Some(RecorderNotice::CannotRemoveFile)
                    }
                }
            }
            RecorderState::Recording => Some(RecorderNotice::CannotDeleteWhileRecording),
            RecorderState::Playing => Some(RecorderNotice::CannotDeleteWhilePlaying),
        };
        self.notify(notice)
    }

    /// The file player reached the end of the file.
    pub fn playback_finished(&mut self) -> Option<RecorderNotice> {
        if self.state != RecorderState::Playing {
            return None;
        }
        self.state = RecorderState::Ready;
        self.notify(Some(RecorderNotice::Ready))
    }

    /// The engine was shut down under a running take or playback.
    ///
    /// The engine finalizes the recording itself, so this only returns to
    /// Ready and re-scans for the new file.
    pub fn engine_stopped(&mut self) -> Option<RecorderNotice> {
        let notice = match self.state {
            RecorderState::Ready => return None,
            RecorderState::Recording => self.refresh().unwrap_or(RecorderNotice::Ready),
            RecorderState::Playing => RecorderNotice::Ready,
        };
        self.state = RecorderState::Ready;
        self.notify(Some(notice))
    }

    pub fn select(&mut self, row: usize) -> bool {
        self.library.select(row)
    }

    /// Sets the player volume from a logarithmic slider: `volume = 10^value`.
    pub fn set_player_volume_slider(&mut self, backend: &mut dyn RecorderBackend, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.player_volume = 10f32.powf(value).min(PLAYER_VOLUME_MAX);
        if let Err(err) = backend.set_player_volume(self.player_volume) {
            log::debug!("Player volume not applied: {}", err);
        }
    }

    /// Re-scans the library and returns a notice if the directory is unreadable.
    pub fn refresh(&mut self) -> Option<RecorderNotice> {
        match self.library.refresh() {
            Ok(()) => None,
            Err(err) => {
                log::warn!(
                    "Could not open {}: {}",
                    self.library.directory().display(),
                    err
                );
                Some(RecorderNotice::DirectoryUnreadable)
            }
        }
    }

    fn notify(&mut self, notice: Option<RecorderNotice>) -> Option<RecorderNotice> {
        if let Some(notice) = notice {
            log::info!("Recorder: {}", notice);
            self.status = Some(notice);
        }
        notice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::EngineError;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        StartRecording(PathBuf),
        StopRecording,
        Play(PathBuf),
        StopPlayback,
        Volume(f32),
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Vec<Call>,
        fail_play: bool,
        fail_record: bool,
    }

    impl RecorderBackend for FakeBackend {
        fn start_recording(&mut self, path: &Path) -> Result<(), EngineError> {
            if self.fail_record {
                return Err(EngineError::NoDevice("input"));
            }
            // Leave a file behind like the engine does.
            fs::write(path, b"").unwrap();
            self.calls.push(Call::StartRecording(path.to_path_buf()));
            Ok(())
        }

        fn stop_recording(&mut self) -> Result<(), EngineError> {
            self.calls.push(Call::StopRecording);
            Ok(())
        }

        fn play_file(&mut self, path: &Path) -> Result<(), EngineError> {
            if self.fail_play {
                return Err(EngineError::NotInitialized);
            }
            self.calls.push(Call::Play(path.to_path_buf()));
            Ok(())
        }

        fn stop_playback(&mut self) -> Result<(), EngineError> {
            self.calls.push(Call::StopPlayback);
            Ok(())
        }

        fn set_player_volume(&mut self, volume: f32) -> Result<(), EngineError> {
            self.calls.push(Call::Volume(volume));
            Ok(())
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 5, 12)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_record_cycle_lists_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());
        assert_eq!(recorder.status(), None);
        assert_eq!(recorder.record_button_label(), "Record");

        assert_eq!(
            recorder.record_pressed(&mut backend, at(9, 5, 3)),
            Some(RecorderNotice::Recording)
        );
        assert_eq!(recorder.state(), RecorderState::Recording);
        assert_eq!(recorder.record_button_label(), "Stop");

        assert_eq!(
            recorder.record_pressed(&mut backend, at(9, 6, 0)),
            Some(RecorderNotice::Ready)
        );
        assert_eq!(recorder.state(), RecorderState::Ready);
        assert_eq!(recorder.library().names(), vec!["20170512_090503.wav"]);
        assert_eq!(
            backend.calls,
            vec![
                Call::StartRecording(tmp.path().join("20170512_090503.wav")),
                Call::StopRecording
            ]
        );
    }

    #[test]
    fn test_record_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("takes");
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(&dir);
        assert_eq!(recorder.status(), Some(RecorderNotice::DirectoryUnreadable));

        recorder.record_pressed(&mut backend, at(10, 0, 0));
        recorder.record_pressed(&mut backend, at(10, 0, 5));

        assert_eq!(recorder.library().len(), 1);
    }

    #[test]
    fn test_record_failure_stays_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend {
            fail_record: true,
            ..FakeBackend::default()
        };
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(
            recorder.record_pressed(&mut backend, at(10, 0, 0)),
            Some(RecorderNotice::CannotStartRecording)
        );
        assert_eq!(recorder.state(), RecorderState::Ready);
    }

    #[test]
    fn test_play_without_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(
            recorder.play_pressed(&mut backend),
            Some(RecorderNotice::NoFilesToPlay)
        );
        assert_eq!(recorder.state(), RecorderState::Ready);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_play_and_stop() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("20170512_090503.wav"), b"").unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(
            recorder.play_pressed(&mut backend),
            Some(RecorderNotice::Playing)
        );
        assert_eq!(recorder.state(), RecorderState::Playing);
        assert_eq!(recorder.play_button_label(), "Stop");

        assert_eq!(
            recorder.play_pressed(&mut backend),
            Some(RecorderNotice::Ready)
        );
        assert_eq!(recorder.state(), RecorderState::Ready);
        assert_eq!(
            backend.calls,
            vec![
                Call::Volume(1.0),
                Call::Play(tmp.path().join("20170512_090503.wav")),
                Call::StopPlayback
            ]
        );
    }

    #[test]
    fn test_play_open_failure_stays_ready() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("broken.wav"), b"").unwrap();
        let mut backend = FakeBackend {
            fail_play: true,
            ..FakeBackend::default()
        };
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(
            recorder.play_pressed(&mut backend),
            Some(RecorderNotice::ErrorOpeningFile)
        );
        assert_eq!(recorder.state(), RecorderState::Ready);
    }

    #[test]
    fn test_playback_finished_returns_to_ready() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.wav"), b"").unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(recorder.playback_finished(), None);

        recorder.play_pressed(&mut backend);
        assert_eq!(recorder.playback_finished(), Some(RecorderNotice::Ready));
        assert_eq!(recorder.state(), RecorderState::Ready);
        assert_eq!(recorder.status(), Some(RecorderNotice::Ready));
    }

    #[test]
    fn test_rejections_leave_state_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.wav"), b"").unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        recorder.play_pressed(&mut backend);
        assert_eq!(
            recorder.record_pressed(&mut backend, at(1, 2, 3)),
            Some(RecorderNotice::CannotRecordWhilePlaying)
        );
        assert_eq!(
            recorder.delete_pressed(),
            Some(RecorderNotice::CannotDeleteWhilePlaying)
        );
        assert_eq!(recorder.state(), RecorderState::Playing);
        assert_eq!(
            RecorderNotice::CannotRecordWhilePlaying.to_string(),
            "Cannot record while playing"
        );

        recorder.play_pressed(&mut backend);
        recorder.record_pressed(&mut backend, at(1, 2, 3));
        assert_eq!(
            recorder.play_pressed(&mut backend),
            Some(RecorderNotice::CannotPlayWhileRecording)
        );
        assert_eq!(
            recorder.delete_pressed(),
            Some(RecorderNotice::CannotDeleteWhileRecording)
        );
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_delete_selected_and_rescan() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("20170511_120000.wav"), b"").unwrap();
        fs::write(tmp.path().join("20170512_090503.wav"), b"").unwrap();
        let mut recorder = RecorderController::new(tmp.path());

        assert_eq!(recorder.delete_pressed(), None);
        assert!(!tmp.path().join("20170512_090503.wav").exists());
        assert_eq!(recorder.library().names(), vec!["20170511_120000.wav"]);
        assert_eq!(recorder.library().selected_index(), Some(0));

        assert_eq!(recorder.delete_pressed(), None);
        assert!(recorder.library().is_empty());
        assert_eq!(
            recorder.delete_pressed(),
            Some(RecorderNotice::NoFilesToRemove)
        );
    }

    #[test]
    fn test_delete_failure_reports_and_rescans() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone.wav");
        fs::write(&path, b"").unwrap();
        let mut recorder = RecorderController::new(tmp.path());

        // Removed behind the controller's back.
        fs::remove_file(&path).unwrap();

        assert_eq!(
            recorder.delete_pressed(),
            Some(RecorderNotice::CannotRemoveFile)
        );
        assert!(recorder.library().is_empty());
    }

    #[test]
    fn test_select_changes_played_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.wav"), b"").unwrap();
        fs::write(tmp.path().join("b.wav"), b"").unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        assert!(recorder.select(1));
        assert!(!recorder.select(5));
        recorder.play_pressed(&mut backend);

        assert!(backend.calls.contains(&Call::Play(tmp.path().join("a.wav"))));
    }

    #[test]
    fn test_volume_slider_is_logarithmic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        recorder.set_player_volume_slider(&mut backend, 0.0);
        assert!((recorder.player_volume() - 1.0).abs() < 1e-6);

        recorder.set_player_volume_slider(&mut backend, -1.0);
        assert!((recorder.player_volume() - 0.1).abs() < 1e-6);

        recorder.set_player_volume_slider(&mut backend, 1.0);
        assert!((recorder.player_volume() - 10.0).abs() < 1e-4);

        recorder.set_player_volume_slider(&mut backend, f32::NAN);
        assert!((recorder.player_volume() - 10.0).abs() < 1e-4);
        assert_eq!(backend.calls.len(), 3);
    }

    #[test]
    fn test_engine_stop_ends_recording() {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        recorder.record_pressed(&mut backend, at(11, 0, 0));
        assert_eq!(recorder.engine_stopped(), Some(RecorderNotice::Ready));

        assert_eq!(recorder.state(), RecorderState::Ready);
        assert_eq!(recorder.record_button_label(), "Record");
        assert_eq!(recorder.library().names(), vec!["20170512_110000.wav"]);
        // Finalizing is the engine's job.
        assert!(!backend.calls.contains(&Call::StopRecording));
    }

    #[test]
    fn test_engine_stop_ends_playback() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.wav"), b"").unwrap();
        let mut backend = FakeBackend::default();
        let mut recorder = RecorderController::new(tmp.path());

        recorder.play_pressed(&mut backend);
        assert_eq!(recorder.state(), RecorderState::Playing);

        assert_eq!(recorder.engine_stopped(), Some(RecorderNotice::Ready));
        assert_eq!(recorder.play_button_label(), "Play");
        assert_eq!(recorder.engine_stopped(), None);
    }
}

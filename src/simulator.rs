//! Application root exposed to Python.
//!
//! [`Simulator`] owns the audio engine, the gain model, the recorder and the OSC service, and
//! maps UI gestures onto them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::audio_engine::audio_stream::setup_logger;
use crate::audio_engine::constants::NUM_BANDS;
use crate::audio_engine::{AudioEngine, EngineError};
use crate::config::SimulatorConfig;
use crate::gain_model::{
    Channel, EditMode, GainError, GainModel, GainSetting, display_db, parse_gain_entry,
};
use crate::messages::AudioMessage;
use crate::osc::{Mode, OscManager, OscService, TriggerSettings, UdpModeLink};
use crate::recorder::{RecorderController, RecorderState};
use crate::scheduler::SystemClock;

fn engine_error(err: EngineError) -> PyErr {
    match err {
        EngineError::OutOfRange { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn gain_error(err: GainError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Hearing-loss simulator session.
#[pyclass]
pub struct Simulator {
    config: SimulatorConfig,
    engine: Mutex<AudioEngine>,
    gains: GainModel,
    edit_mode: EditMode,
    recorder: RecorderController,
    osc: Option<OscService>,
    countdown_enabled: bool,
}

impl Simulator {
    fn engine(&mut self) -> PyResult<&mut AudioEngine> {
        self.engine
            .get_mut()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire engine lock"))
    }

    /// Sends the current gains of `channels` to the audio thread, if it runs.
    fn push_gains(&mut self, channels: &[Channel]) -> PyResult<()> {
        let gains: Vec<(Channel, [f32; NUM_BANDS])> = channels
            .iter()
            .map(|&channel| (channel, self.gains.linear_gains(channel)))
            .collect();

        let engine = self.engine()?;
        if !engine.is_initialized() {
            return Ok(());
        }
        for (channel, linear) in gains {
            engine.set_band_gains(channel, linear).map_err(engine_error)?;
        }
        Ok(())
    }

    fn osc_service(&mut self) -> PyResult<&mut OscService> {
        if self.osc.is_none() {
            let (amplitude, mixer) = {
                let engine = self.engine()?;
                (engine.amplitude_source(), engine.control_sender())
            };
            let transport = UdpModeLink::from_config(&self.config.osc)
                .map_err(|e| PyRuntimeError::new_err(format!("Failed to open OSC link: {e}")))?;

            let mut manager = OscManager::new(
                Arc::new(SystemClock::new()),
                Box::new(transport),
                Arc::new(amplitude),
                Arc::new(mixer),
                TriggerSettings::from(&self.config.osc),
                self.config.osc.poll_interval(),
            );
            manager.enable_countdown(self.countdown_enabled);
            self.osc = Some(OscService::spawn(manager));
        }

        self.osc
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("OSC service unavailable"))
    }

    fn with_manager<R>(&self, f: impl FnOnce(&mut OscManager) -> R) -> Option<R> {
        let service = self.osc.as_ref()?;
        let mut manager = service.manager()?;
        Some(f(&mut manager))
    }
}

#[pymethods]
impl Simulator {
    /// Create a simulator, optionally reading settings from a TOML file.
    #[new]
    #[pyo3(signature = (config_path=None))]
    pub fn new(config_path: Option<PathBuf>) -> PyResult<Self> {
        setup_logger();

        let config = match config_path {
            Some(path) => SimulatorConfig::load(&path)
                .map_err(|e| PyValueError::new_err(format!("Invalid config: {e}")))?,
            None => SimulatorConfig::default(),
        };

        let engine = AudioEngine::new(&config.audio);
        let recorder = RecorderController::new(config.recordings.directory.clone());

        Ok(Simulator {
            config,
            engine: Mutex::new(engine),
            gains: GainModel::new(),
            edit_mode: EditMode::default(),
            recorder,
            osc: None,
            countdown_enabled: false,
        })
    }

    /// Open the audio devices. The microphone stays muted until the main switch is turned on.
    pub fn initialize(&mut self) -> PyResult<()> {
        self.engine()?.initialize().map_err(engine_error)?;
        self.push_gains(&[Channel::Left, Channel::Right])
    }

    /// Stop the OSC service and release the audio devices.
    ///
    /// A running take or playback ends with the engine and the recorder returns to Ready.
    pub fn shut_down(&mut self) -> PyResult<()> {
        if let Some(mut service) = self.osc.take() {
            service.shutdown();
        }
        let result = self.engine()?.shut_down().map_err(engine_error);
        self.recorder.engine_stopped();
        result
    }

    pub fn set_main_switch(&mut self, on: bool) -> PyResult<()> {
        let engine = self.engine()?;
        let result = if on {
            engine.start_microphone()
        } else {
            engine.stop_microphone()
        };
        result.map_err(engine_error)
    }

    pub fn set_ear_canal_compensation(&mut self, enabled: bool) -> PyResult<()> {
        self.engine()?
            .set_ear_canal_compensation(enabled)
            .map_err(engine_error)
    }

    pub fn set_osc_enabled(&mut self, enabled: bool) -> PyResult<()> {
        if enabled {
            let service = self.osc_service()?;
            if let Some(mut manager) = service.manager() {
                manager.start();
            }
        } else {
            self.with_manager(|manager| manager.stop());
        }
        Ok(())
    }

    pub fn set_countdown_enabled(&mut self, enabled: bool) {
        self.countdown_enabled = enabled;
        self.with_manager(|manager| manager.enable_countdown(enabled));
    }

    /// Current OSC mode code (1 = VR, 2 = AR).
    pub fn osc_mode(&self) -> i32 {
        self.with_manager(|manager| manager.current_mode().code())
            .unwrap_or(Mode::Vr.code())
    }

    pub fn osc_running(&self) -> bool {
        self.with_manager(|manager| manager.is_running())
            .unwrap_or(false)
    }

    /// Switching to both ears makes the right chain a copy of the left one.
    pub fn set_edit_mode(&mut self, mode: EditMode) -> PyResult<()> {
        self.edit_mode = mode;
        if mode == EditMode::Both {
            self.gains.copy_left_to_right();
            self.push_gains(&[Channel::Right])?;
        }
        Ok(())
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    /// Preset button: 1 = mild, 2 = moderate, 3 = severe, anything else = no loss.
    pub fn preset_pressed(&mut self, button: usize) -> PyResult<()> {
        self.apply_preset(GainSetting::from_button(button))
    }

    pub fn apply_preset(&mut self, setting: GainSetting) -> PyResult<()> {
        self.gains.apply_preset(self.edit_mode, setting);
        self.push_gains(self.edit_mode.targets())
    }

    pub fn slider_moved(&mut self, index: usize, gain_db: f32) -> PyResult<()> {
        self.gains
            .apply_band_gain(self.edit_mode, index, gain_db)
            .map_err(gain_error)?;
        self.push_gains(self.edit_mode.targets())
    }

    /// Apply a typed gain; returns the value the field should show.
    ///
    /// Invalid text leaves the gains unchanged and returns the current value.
    pub fn text_entered(&mut self, index: usize, text: &str) -> PyResult<i32> {
        let current = *self
            .gains
            .display_gains(self.edit_mode)
            .get(index)
            .ok_or_else(|| gain_error(GainError::BandOutOfRange(index)))?;

        match parse_gain_entry(text) {
            Some(gain_db) => {
                self.slider_moved(index, gain_db)?;
                Ok(display_db(gain_db))
            }
            None => Ok(display_db(current)),
        }
    }

    /// dB gains of the channel shown in the current edit mode.
    pub fn display_gains(&self) -> Vec<f32> {
        self.gains.display_gains(self.edit_mode).to_vec()
    }

    pub fn get_gain(&self, channel: Channel) -> Vec<f32> {
        self.gains.get_gain(channel).to_vec()
    }

    pub fn record_pressed(&mut self) -> PyResult<Option<String>> {
        let engine = self
            .engine
            .get_mut()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire engine lock"))?;
        let notice = self
            .recorder
            .record_pressed(engine, Local::now().naive_local());
        Ok(notice.map(|n| n.to_string()))
    }

    pub fn play_pressed(&mut self) -> PyResult<Option<String>> {
        let engine = self
            .engine
            .get_mut()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire engine lock"))?;
        let notice = self.recorder.play_pressed(engine);
        Ok(notice.map(|n| n.to_string()))
    }

    pub fn delete_pressed(&mut self) -> Option<String> {
        self.recorder.delete_pressed().map(|n| n.to_string())
    }

    pub fn select_file(&mut self, row: usize) -> bool {
        self.recorder.select(row)
    }

    pub fn file_names(&self) -> Vec<String> {
        self.recorder.library().names()
    }

    pub fn selected_file(&self) -> Option<usize> {
        self.recorder.library().selected_index()
    }

    pub fn set_volume_slider(&mut self, value: f32) -> PyResult<()> {
        let engine = self
            .engine
            .get_mut()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire engine lock"))?;
        self.recorder.set_player_volume_slider(engine, value);
        Ok(())
    }

    pub fn recorder_status(&self) -> Option<String> {
        self.recorder.status().map(|n| n.to_string())
    }

    pub fn recorder_state(&self) -> &'static str {
        match self.recorder.state() {
            RecorderState::Ready => "ready",
            RecorderState::Recording => "recording",
            RecorderState::Playing => "playing",
        }
    }

    pub fn record_button_label(&self) -> &'static str {
        self.recorder.record_button_label()
    }

    pub fn play_button_label(&self) -> &'static str {
        self.recorder.play_button_label()
    }

    /// Smoothed microphone amplitude.
    pub fn amplitude(&mut self) -> PyResult<f32> {
        Ok(self.engine()?.amplitude_source().load())
    }

    /// Send a ping message to the audio thread.
    pub fn ping(&mut self) -> PyResult<()> {
        self.engine()?.ping().map_err(engine_error)
    }

    /// Drain audio-thread events; returns the recorder notices they caused plus `"pong"` for pings.
    pub fn poll(&mut self) -> PyResult<Vec<String>> {
        let messages = self.engine()?.poll_messages();

        let mut notices = Vec::new();
        for message in messages {
            match message {
                AudioMessage::Pong() => notices.push("pong".to_string()),
                AudioMessage::PlaybackEnded() => {
                    if let Some(notice) = self.recorder.playback_finished() {
                        notices.push(notice.to_string());
                    }
                }
            }
        }
        Ok(notices)
    }
}

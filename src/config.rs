//! Simulator configuration.
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::UserDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio_engine::constants::{DEFAULT_BUFFER_FRAMES, VOLUME_MAX, VOLUME_MIN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SimulatorConfig {
    pub osc: OscConfig,
    pub audio: AudioConfig,
    pub recordings: RecordingsConfig,
}

/// OSC link and mode-trigger tuning.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OscConfig {
    /// Peer that receives outbound mode messages.
    pub remote_host: String,
    pub remote_port: u16,

    /// Local UDP port for inbound mode messages.
    pub listen_port: u16,

    /// Amplitude poll period.
    pub poll_interval_ms: u64,

    /// Amplitude rise between two polls that switches VR to AR.
    pub threshold: f32,

    /// Time spent in AR before falling back to VR.
    pub countdown_secs: f64,

    /// Mixer volume while in AR.
    pub foreground_volume: f32,

    /// Mixer volume while in VR.
    pub background_volume: f32,

    /// Echo inbound mode changes back to the peer.
    pub acknowledge_inbound: bool,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            remote_host: "localhost".to_string(),
            remote_port: 8080,
            listen_port: 8081,
            poll_interval_ms: 100,
            threshold: 0.05,
            countdown_secs: 10.0,
            foreground_volume: 1.0,
            background_volume: 0.1,
            acknowledge_inbound: false,
        }
    }
}

impl OscConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Countdown length. Values [`validate`](SimulatorConfig::validate) rejects saturate.
    pub fn countdown(&self) -> Duration {
        Duration::try_from_secs_f64(self.countdown_secs).unwrap_or(if self.countdown_secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Stream buffer size, in frames.
    pub buffer_frames: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RecordingsConfig {
    pub directory: PathBuf,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            directory: default_recordings_dir(),
        }
    }
}

/// The user's documents directory, or the working directory when there is none.
fn default_recordings_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl SimulatorConfig {
    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<SimulatorConfig>(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let osc = &self.osc;

        if osc.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "osc.poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if !osc.threshold.is_finite() || osc.threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "osc.threshold",
                reason: "must be a finite, non-negative number",
            });
        }
        if Duration::try_from_secs_f64(osc.countdown_secs).is_err() {
            return Err(ConfigError::Invalid {
                field: "osc.countdown_secs",
                reason: "must be a non-negative number of seconds that fits a duration",
            });
        }
        for (field, volume) in [
            ("osc.foreground_volume", osc.foreground_volume),
            ("osc.background_volume", osc.background_volume),
        ] {
            if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be between 0 and 1",
                });
            }
        }
        if self.audio.buffer_frames == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.buffer_frames",
                reason: "must be greater than zero",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.osc.remote_host, "localhost");
        assert_eq!(config.osc.remote_port, 8080);
        assert_eq!(config.osc.listen_port, 8081);
        assert_eq!(config.osc.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.osc.countdown(), Duration::from_secs(10));
        assert_eq!(config.osc.threshold, 0.05);
        assert_eq!(config.osc.foreground_volume, 1.0);
        assert_eq!(config.osc.background_volume, 0.1);
        assert!(!config.osc.acknowledge_inbound);
        assert_eq!(config.audio.buffer_frames, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = SimulatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            [osc]
            remote_host = "192.168.1.20"
            countdown_secs = 2.5
            acknowledge_inbound = true

            [recordings]
            directory = "/tmp/takes"
        "#;

        let config = SimulatorConfig::from_toml_str(text).unwrap();
        assert_eq!(config.osc.remote_host, "192.168.1.20");
        assert_eq!(config.osc.remote_port, 8080);
        assert_eq!(config.osc.countdown(), Duration::from_millis(2500));
        assert!(config.osc.acknowledge_inbound);
        assert_eq!(config.recordings.directory, PathBuf::from("/tmp/takes"));
    }

    #[test]
    fn test_rejects_out_of_range_volume() {
        let text = "[osc]\nbackground_volume = 1.5\n";
        let err = SimulatorConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "osc.background_volume",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let text = "[osc]\npoll_interval_ms = 0\n";
        assert!(matches!(
            SimulatorConfig::from_toml_str(text),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_rejects_huge_countdown() {
        let result = SimulatorConfig::from_toml_str("[osc]\ncountdown_secs = 1e20\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "osc.countdown_secs",
                ..
            })
        ));
        assert!(SimulatorConfig::from_toml_str("[osc]\ncountdown_secs = -1.0\n").is_err());
    }

    #[test]
    fn test_countdown_never_panics() {
        let mut osc = OscConfig::default();
        osc.countdown_secs = 1e20;
        assert_eq!(osc.countdown(), Duration::MAX);
        osc.countdown_secs = f64::NAN;
        assert_eq!(osc.countdown(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            SimulatorConfig::from_toml_str("[osc\nport = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("simulator.toml");
        fs::write(&path, "[audio]\nbuffer_frames = 256\n").unwrap();

        let config = SimulatorConfig::load(&path).unwrap();
        assert_eq!(config.audio.buffer_frames, 256);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let result = SimulatorConfig::load(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

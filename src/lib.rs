use pyo3::pymodule;

pub mod audio_engine;
pub mod config;
pub mod gain_model;
pub mod messages;
pub mod osc;
pub mod recorder;
pub mod scheduler;
pub mod simulator;

/// The Python module implemented in Rust.
#[pymodule]
mod hearing_loss_simulator {
    #[pymodule_export]
    use super::simulator::Simulator;

    #[pymodule_export]
    use super::gain_model::GainSetting;

    #[pymodule_export]
    use super::gain_model::Channel;

    #[pymodule_export]
    use super::gain_model::EditMode;
}

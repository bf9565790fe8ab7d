use crate::audio::AudioError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Generic failure code reported by the synthesis engine.
pub const ENGINE_FAILED: i32 = -1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("soundfont {0} is not loaded")]
    UnknownSoundfont(SoundfontId),
    #[error("soundfont load failed: {0}")]
    SoundfontLoad(String),
    #[error("{what} {value} is out of range")]
    OutOfRange { what: &'static str, value: i32 },
    #[error("no preset at bank {bank}, program {program}")]
    PresetNotFound { bank: i32, program: i32 },
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error("setting {name} is a {expected} setting")]
    SettingType { name: String, expected: &'static str },
    #[error("setting {0} is read-only")]
    ReadOnlySetting(String),
    #[error("audio engine error: {0}")]
    Engine(String),
    #[error("operation not supported by the {0} backend")]
    Unsupported(BackendKind),
    #[error("backend has been disposed")]
    Disposed,
}

impl BackendError {
    /// Raw numeric code, as the synthesis engine would have returned it.
    pub fn raw_code(&self) -> i32 {
        ENGINE_FAILED
    }
}

impl From<AudioError> for BackendError {
    fn from(err: AudioError) -> Self {
        BackendError::Engine(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    NativeSynth,
    SystemSampler,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::NativeSynth => "native-synth",
            BackendKind::SystemSampler => "system-sampler",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Thread model:
/// - every method may be called concurrently from blocking worker threads
/// - implementations guard their registry internally
/// - successful status results are non-negative (usually 0)
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn load_soundfont(
        &self,
        path: &Path,
        bank: i32,
        program: i32,
    ) -> Result<SoundfontId, BackendError>;

    fn select_instrument(
        &self,
        sf_id: SoundfontId,
        channel: i32,
        bank: i32,
        program: i32,
    ) -> Result<i32, BackendError>;

    fn play_note(
        &self,
        channel: i32,
        key: i32,
        velocity: i32,
        sf_id: SoundfontId,
    ) -> Result<i32, BackendError>;

    fn stop_note(&self, channel: i32, key: i32, sf_id: SoundfontId) -> Result<i32, BackendError>;

    fn stop_all_notes(&self) -> Result<i32, BackendError>;

    fn unload_soundfont(&self, sf_id: SoundfontId) -> Result<i32, BackendError>;

    /// Releases every soundfont and the audio engine. Terminal.
    fn dispose(&self) -> Result<i32, BackendError>;

    /// Handles currently present in the registry, ascending.
    fn loaded_soundfonts(&self) -> Vec<SoundfontId>;

    fn set_setting(
        &self,
        _sf_id: SoundfontId,
        _name: &str,
        _value: SettingValue,
    ) -> Result<i32, BackendError> {
        Err(BackendError::Unsupported(self.kind()))
    }

    fn get_int(&self, _sf_id: SoundfontId, _name: &str) -> Result<i32, BackendError> {
        Err(BackendError::Unsupported(self.kind()))
    }

    fn get_num(&self, _sf_id: SoundfontId, _name: &str) -> Result<f64, BackendError> {
        Err(BackendError::Unsupported(self.kind()))
    }
}

use crate::backend::BackendKind;
use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_sample_rate_hz() -> u32 {
    44_100
}

fn default_load_settle_ms() -> u64 {
    500
}

fn default_master_volume() -> Volume01 {
    Volume01::new(1.0)
}

fn default_max_polyphony() -> usize {
    64
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub backend: BackendKind,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    pub audio_buffer_size_frames: Option<u32>,
    /// Silence kept after a soundfont load before the volume comes back.
    #[serde(default = "default_load_settle_ms")]
    pub load_settle_ms: u64,
    #[serde(default = "default_master_volume")]
    pub master_volume: Volume01,
    #[serde(default = "default_max_polyphony")]
    pub max_polyphony: usize,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sample_rate_hz: default_sample_rate_hz(),
            audio_buffer_size_frames: None,
            load_settle_ms: default_load_settle_ms(),
            master_volume: default_master_volume(),
            max_polyphony: default_max_polyphony(),
        }
    }
}

impl SettingsDto {
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate_hz: self.sample_rate_hz,
            channels: 2,
            buffer_size_frames: self.audio_buffer_size_frames,
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}

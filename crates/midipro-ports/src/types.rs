use serde::{Deserialize, Serialize};
use std::fmt;

pub type SampleTime = u64; // audio sample index, monotonic while stream running

/// Number of addressable MIDI channels per synthesizer.
pub const MIDI_CHANNELS: u8 = 16;

/// Handle of a loaded soundfont (`sfId` on the wire). Assigned from 1 upwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundfontId(pub i32);

impl SoundfontId {
    pub const FIRST: SoundfontId = SoundfontId(1);

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SoundfontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument coordinates within a soundfont.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instrument {
    pub bank: i32,
    pub program: i32,
}

impl Instrument {
    pub fn new(bank: i32, program: i32) -> Self {
        Self { bank, program }
    }
}

/// Value of a named synthesis setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i32),
    Num(f64),
    Str(String),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "int",
            SettingValue::Num(_) => "num",
            SettingValue::Str(_) => "str",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16, // fixed 2
    pub buffer_size_frames: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            channels: 2,
            buffer_size_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Volume01(pub f32);

impl Volume01 {
    pub const MUTED: Volume01 = Volume01(0.0);

    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

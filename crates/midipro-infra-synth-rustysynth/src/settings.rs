use midipro_ports::backend::BackendError;
use midipro_ports::types::{AudioConfig, SettingValue, MIDI_CHANNELS};
use rustysynth::SynthesizerSettings;
use std::collections::BTreeMap;

pub const GAIN: &str = "synth.gain";
pub const SAMPLE_RATE: &str = "synth.sample-rate";
pub const POLYPHONY: &str = "synth.polyphony";
pub const REVERB_ACTIVE: &str = "synth.reverb.active";
pub const CHORUS_ACTIVE: &str = "synth.chorus.active";
pub const PERIOD_SIZE: &str = "audio.period-size";
pub const MIDI_CHANNEL_COUNT: &str = "synth.midi-channels";
pub const THREADSAFE_API: &str = "synth.threadsafe-api";
pub const LOCK_MEMORY: &str = "synth.lock-memory";

#[derive(Clone, Copy, Debug, PartialEq)]
enum Range {
    Int(i32, i32),
    Num(f64, f64),
    Str,
}

struct SettingDef {
    name: &'static str,
    range: Range,
    writable: bool,
}

const DEFINITIONS: &[SettingDef] = &[
    SettingDef { name: GAIN, range: Range::Num(0.0, 10.0), writable: true },
    SettingDef { name: SAMPLE_RATE, range: Range::Num(16_000.0, 192_000.0), writable: true },
    SettingDef { name: POLYPHONY, range: Range::Int(1, 65_535), writable: true },
    SettingDef { name: REVERB_ACTIVE, range: Range::Int(0, 1), writable: true },
    SettingDef { name: CHORUS_ACTIVE, range: Range::Int(0, 1), writable: true },
    SettingDef { name: PERIOD_SIZE, range: Range::Int(64, 8_192), writable: true },
    SettingDef { name: MIDI_CHANNEL_COUNT, range: Range::Int(16, 16), writable: false },
    SettingDef { name: THREADSAFE_API, range: Range::Str, writable: true },
    SettingDef { name: LOCK_MEMORY, range: Range::Str, writable: true },
];

fn definition(name: &str) -> Result<&'static SettingDef, BackendError> {
    DEFINITIONS
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| BackendError::UnknownSetting(name.to_string()))
}

/// Named settings of one synthesizer instance.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthSettings {
    values: BTreeMap<&'static str, SettingValue>,
}

impl SynthSettings {
    pub fn new(audio: AudioConfig, max_polyphony: usize) -> Self {
        let polyphony = i32::try_from(max_polyphony).unwrap_or(i32::MAX).clamp(1, 65_535);
        let period = audio
            .buffer_size_frames
            .and_then(|frames| i32::try_from(frames).ok())
            .unwrap_or(0);

        let mut values = BTreeMap::new();
        values.insert(GAIN, SettingValue::Num(1.0));
        values.insert(SAMPLE_RATE, SettingValue::Num(audio.sample_rate_hz as f64));
        values.insert(POLYPHONY, SettingValue::Int(polyphony));
        values.insert(REVERB_ACTIVE, SettingValue::Int(1));
        values.insert(CHORUS_ACTIVE, SettingValue::Int(1));
        values.insert(PERIOD_SIZE, SettingValue::Int(period));
        values.insert(MIDI_CHANNEL_COUNT, SettingValue::Int(MIDI_CHANNELS as i32));
        values.insert(THREADSAFE_API, SettingValue::Str("yes".to_string()));
        values.insert(LOCK_MEMORY, SettingValue::Str("yes".to_string()));
        Self { values }
    }

    pub fn set(&mut self, name: &str, value: SettingValue) -> Result<(), BackendError> {
        let def = definition(name)?;
        if !def.writable {
            return Err(BackendError::ReadOnlySetting(name.to_string()));
        }

        let in_range = match (def.range, &value) {
            (Range::Int(min, max), SettingValue::Int(v)) => (min..=max).contains(v),
            (Range::Num(min, max), SettingValue::Num(v)) => (min..=max).contains(v),
            (Range::Str, SettingValue::Str(_)) => true,
            (range, _) => {
                return Err(BackendError::SettingType {
                    name: name.to_string(),
                    expected: range_type(range),
                })
            }
        };
        if !in_range {
            return Err(BackendError::OutOfRange {
                what: def.name,
                value: match value {
                    SettingValue::Int(v) => v,
                    SettingValue::Num(v) => v as i32,
                    SettingValue::Str(_) => 0,
                },
            });
        }

        self.values.insert(def.name, value);
        Ok(())
    }

    pub fn int(&self, name: &str) -> Result<i32, BackendError> {
        match self.value(name)? {
            SettingValue::Int(v) => Ok(*v),
            _ => Err(BackendError::SettingType {
                name: name.to_string(),
                expected: range_type(definition(name)?.range),
            }),
        }
    }

    pub fn num(&self, name: &str) -> Result<f64, BackendError> {
        match self.value(name)? {
            SettingValue::Num(v) => Ok(*v),
            _ => Err(BackendError::SettingType {
                name: name.to_string(),
                expected: range_type(definition(name)?.range),
            }),
        }
    }

    fn value(&self, name: &str) -> Result<&SettingValue, BackendError> {
        let def = definition(name)?;
        self.values
            .get(def.name)
            .ok_or_else(|| BackendError::UnknownSetting(name.to_string()))
    }

    pub fn gain(&self) -> f32 {
        self.num(GAIN).unwrap_or(1.0) as f32
    }

    pub fn synthesizer_settings(&self) -> SynthesizerSettings {
        let sample_rate = self.num(SAMPLE_RATE).unwrap_or(44_100.0) as i32;
        let mut settings = SynthesizerSettings::new(sample_rate);
        if let Ok(polyphony) = self.int(POLYPHONY) {
            settings.maximum_polyphony = polyphony as usize;
        }
        let reverb = self.int(REVERB_ACTIVE).unwrap_or(0) != 0;
        let chorus = self.int(CHORUS_ACTIVE).unwrap_or(0) != 0;
        settings.enable_reverb_and_chorus = reverb || chorus;
        settings
    }

    pub fn audio_config(&self) -> AudioConfig {
        let sample_rate_hz = self.num(SAMPLE_RATE).unwrap_or(44_100.0) as u32;
        let buffer_size_frames = match self.int(PERIOD_SIZE) {
            Ok(frames) if frames > 0 => Some(frames as u32),
            _ => None,
        };
        AudioConfig {
            sample_rate_hz,
            channels: 2,
            buffer_size_frames,
        }
    }
}

fn range_type(range: Range) -> &'static str {
    match range {
        Range::Int(..) => "int",
        Range::Num(..) => "num",
        Range::Str => "str",
    }
}

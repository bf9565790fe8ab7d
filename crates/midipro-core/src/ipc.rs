use midipro_ports::backend::{BackendError, BackendKind};
use midipro_ports::types::{SettingValue, SoundfontId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const LOAD_SOUNDFONT: &str = "loadSoundfont";
pub const SELECT_INSTRUMENT: &str = "selectInstrument";
pub const PLAY_NOTE: &str = "playNote";
pub const STOP_NOTE: &str = "stopNote";
pub const UNLOAD_SOUNDFONT: &str = "unloadSoundfont";
pub const SET_STR: &str = "setStr";
pub const SET_INT: &str = "setInt";
pub const SET_NUM: &str = "setNum";
pub const GET_INT: &str = "getInt";
pub const GET_NUM: &str = "getNum";
pub const STOP_ALL_NOTES: &str = "stopAllNotes";
pub const DISPOSE: &str = "dispose";

/// A named call with string-keyed arguments, as sent by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Arguments::default(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.0.insert(key.into(), value.into());
        self
    }
}

/// Call arguments. A `null` value counts as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(pub BTreeMap<String, Value>);

impl Arguments {
    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn int(&self, key: &str) -> Result<Option<i32>, MethodError> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| MethodError::invalid_argument(format!("{key} must be an integer")))
    }

    pub fn num(&self, key: &str) -> Result<Option<f64>, MethodError> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| MethodError::invalid_argument(format!("{key} must be a number")))
    }

    pub fn str(&self, key: &str) -> Result<Option<&str>, MethodError> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        value
            .as_str()
            .map(Some)
            .ok_or_else(|| MethodError::invalid_argument(format!("{key} must be a string")))
    }

    fn required<T>(found: Result<Option<T>, MethodError>, key: &str) -> Result<T, MethodError> {
        found?.ok_or_else(|| MethodError::invalid_argument(format!("{key} is required")))
    }

    pub fn require_int(&self, key: &str) -> Result<i32, MethodError> {
        Self::required(self.int(key), key)
    }

    pub fn require_num(&self, key: &str) -> Result<f64, MethodError> {
        Self::required(self.num(key), key)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, MethodError> {
        Self::required(self.str(key), key)
    }

    fn sf_id_or_default(&self) -> Result<SoundfontId, MethodError> {
        Ok(self.int("sfId")?.map(SoundfontId).unwrap_or(SoundfontId::FIRST))
    }
}

/// A call after validation, with defaults filled in.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    LoadSoundfont {
        path: PathBuf,
        bank: i32,
        program: i32,
    },
    SelectInstrument {
        sf_id: SoundfontId,
        channel: i32,
        bank: i32,
        program: i32,
    },
    PlayNote {
        channel: i32,
        key: i32,
        velocity: i32,
        sf_id: SoundfontId,
    },
    StopNote {
        channel: i32,
        key: i32,
        sf_id: SoundfontId,
    },
    UnloadSoundfont {
        sf_id: SoundfontId,
    },
    SetSetting {
        sf_id: SoundfontId,
        name: String,
        value: SettingValue,
    },
    GetInt {
        sf_id: SoundfontId,
        name: String,
    },
    GetNum {
        sf_id: SoundfontId,
        name: String,
    },
    StopAllNotes,
    Dispose,
}

impl Request {
    pub fn parse(call: &MethodCall) -> Result<Self, MethodError> {
        let args = &call.arguments;
        let request = match call.method.as_str() {
            LOAD_SOUNDFONT => Request::LoadSoundfont {
                path: PathBuf::from(args.require_str("path")?),
                bank: args.int("bank")?.unwrap_or(0),
                program: args.int("program")?.unwrap_or(0),
            },
            SELECT_INSTRUMENT => Request::SelectInstrument {
                sf_id: args.sf_id_or_default()?,
                channel: args.int("channel")?.unwrap_or(0),
                bank: args.int("bank")?.unwrap_or(0),
                program: args.int("program")?.unwrap_or(0),
            },
            PLAY_NOTE => {
                let (channel, key, velocity, sf_id) = (
                    args.int("channel")?,
                    args.int("key")?,
                    args.int("velocity")?,
                    args.int("sfId")?,
                );
                match (channel, key, velocity, sf_id) {
                    (Some(channel), Some(key), Some(velocity), Some(sf_id)) => Request::PlayNote {
                        channel,
                        key,
                        velocity,
                        sf_id: SoundfontId(sf_id),
                    },
                    _ => {
                        return Err(MethodError::invalid_argument(
                            "channel, key, velocity and sfId are required",
                        ))
                    }
                }
            }
            STOP_NOTE => {
                let (channel, key, sf_id) =
                    (args.int("channel")?, args.int("key")?, args.int("sfId")?);
                match (channel, key, sf_id) {
                    (Some(channel), Some(key), Some(sf_id)) => Request::StopNote {
                        channel,
                        key,
                        sf_id: SoundfontId(sf_id),
                    },
                    _ => {
                        return Err(MethodError::invalid_argument(
                            "channel, key and sfId are required",
                        ))
                    }
                }
            }
            UNLOAD_SOUNDFONT => Request::UnloadSoundfont {
                sf_id: SoundfontId(args.require_int("sfId")?),
            },
            SET_STR => Request::SetSetting {
                sf_id: args.sf_id_or_default()?,
                name: args.require_str("name")?.to_string(),
                value: SettingValue::Str(args.require_str("value")?.to_string()),
            },
            SET_INT => Request::SetSetting {
                sf_id: args.sf_id_or_default()?,
                name: args.require_str("name")?.to_string(),
                value: SettingValue::Int(args.require_int("value")?),
            },
            SET_NUM => Request::SetSetting {
                sf_id: args.sf_id_or_default()?,
                name: args.require_str("name")?.to_string(),
                value: SettingValue::Num(args.require_num("value")?),
            },
            GET_INT => Request::GetInt {
                sf_id: args.sf_id_or_default()?,
                name: args.require_str("name")?.to_string(),
            },
            GET_NUM => Request::GetNum {
                sf_id: args.sf_id_or_default()?,
                name: args.require_str("name")?.to_string(),
            },
            STOP_ALL_NOTES => Request::StopAllNotes,
            DISPOSE => Request::Dispose,
            other => return Err(MethodError::not_implemented(other)),
        };
        Ok(request)
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Request::LoadSoundfont { .. } => LOAD_SOUNDFONT,
            Request::SelectInstrument { .. } => SELECT_INSTRUMENT,
            Request::PlayNote { .. } => PLAY_NOTE,
            Request::StopNote { .. } => STOP_NOTE,
            Request::UnloadSoundfont { .. } => UNLOAD_SOUNDFONT,
            Request::SetSetting { value, .. } => match value {
                SettingValue::Str(_) => SET_STR,
                SettingValue::Int(_) => SET_INT,
                SettingValue::Num(_) => SET_NUM,
            },
            Request::GetInt { .. } => GET_INT,
            Request::GetNum { .. } => GET_NUM,
            Request::StopAllNotes => STOP_ALL_NOTES,
            Request::Dispose => DISPOSE,
        }
    }
}

/// Plain success value; no envelope.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Int(i32),
    Num(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    LoadInProgress,
    FluidsynthError,
    SamplerError,
    NotImplemented,
    Disposed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::LoadInProgress => "LOAD_IN_PROGRESS",
            ErrorCode::FluidsynthError => "FLUIDSYNTH_ERROR",
            ErrorCode::SamplerError => "SAMPLER_ERROR",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::Disposed => "DISPOSED",
        }
    }

    /// Code under which a backend reports engine failures.
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::NativeSynth => ErrorCode::FluidsynthError,
            BackendKind::SystemSampler => ErrorCode::SamplerError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned over the method channel.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct MethodError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl MethodError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn load_in_progress() -> Self {
        Self::new(
            ErrorCode::LoadInProgress,
            "Another soundfont is currently loading",
        )
    }

    pub fn not_implemented(method: &str) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{method} is not implemented"),
        )
    }

    pub fn disposed() -> Self {
        Self::new(ErrorCode::Disposed, "The player has been disposed")
    }

    /// Converts a backend failure; `context` says what was attempted.
    pub fn from_backend(kind: BackendKind, context: &str, err: &BackendError) -> Self {
        match err {
            BackendError::Disposed => Self::disposed(),
            BackendError::Unsupported(_) => {
                Self::new(ErrorCode::NotImplemented, format!("{context}: {err}"))
            }
            BackendError::SoundfontLoad(reason) => Self::invalid_argument(format!(
                "{context}. Check the path of the soundfont"
            ))
            .with_details(json!({ "reason": reason })),
            BackendError::UnknownSoundfont(sf_id) => {
                Self::new(ErrorCode::for_backend(kind), format!("{context}: {err}")).with_details(
                    json!({ "code": err.raw_code(), "sfId": sf_id.get(), "reason": "unknown_soundfont" }),
                )
            }
            _ => Self::new(ErrorCode::for_backend(kind), format!("{context}: {err}"))
                .with_details(json!({ "code": err.raw_code(), "reason": err.to_string() })),
        }
    }

    /// The task running a call did not finish normally.
    pub fn task_failed(kind: BackendKind, context: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::for_backend(kind),
            format!("{context}: backend task failed: {reason}"),
        )
    }
}

/// One line on the host channel: a call plus an optional correlation id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequest {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub call: MethodCall,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Result(Reply),
    Error(MethodError),
}

impl From<Result<Reply, MethodError>> for Outcome {
    fn from(result: Result<Reply, MethodError>) -> Self {
        match result {
            Ok(reply) => Outcome::Result(reply),
            Err(err) => Outcome::Error(err),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub id: Option<u64>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

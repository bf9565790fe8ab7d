use midipro_ports::storage::{SettingsDto, StorageError, StoragePort};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

/// Settings kept as `settings.json` inside a config directory.
///
/// The first load writes the defaults out so there is a file to edit. Saves
/// go through a sibling temp file and a rename, so a crash mid-write never
/// leaves a truncated `settings.json` behind.
pub struct FsStorage {
    base_dir: PathBuf,
}

fn io_error(path: &Path, err: io::Error) -> StorageError {
    StorageError::Io(format!("{}: {}", path.display(), err))
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("midipro"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE)
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| io_error(path, e))?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::Serde(format!("{}: {}", path.display(), e)))
    }

    fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let mut data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        data.push(b'\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(|e| io_error(&tmp, e))?;
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(path, err));
        }
        Ok(())
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_dir }
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        if path.exists() {
            return Self::read_json(&path);
        }

        let settings = SettingsDto::default();
        match Self::write_json_atomic(&path, &settings) {
            Ok(()) => debug!(path = %path.display(), "wrote default settings"),
            // A read-only config dir still gets a working player.
            Err(err) => warn!(%err, "could not write default settings"),
        }
        Ok(settings)
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        Self::write_json_atomic(&self.settings_path(), s)
    }
}

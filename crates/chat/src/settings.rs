use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use finsight_storage::{FileStore, StorageKey, StorageResult};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::input::DEFAULT_MAX_INPUT_CHARS;
use crate::persistence::{DEFAULT_STORAGE_KEY, KeyValuePersistence};

pub const DEFAULT_ASSISTANT_NAME: &str = "FinSight AI";
pub const DEFAULT_OWNER_NAME: &str = "Shreyas & Kanupriya";
pub const SETTINGS_DIRECTORY_NAME: &str = "finsight";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "FINSIGHT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub assistant_name: String,
    pub owner_name: String,
    /// Replaces the greeting derived from the names above.
    pub welcome_message: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub storage_key: String,
    pub max_input_chars: usize,
    pub max_stored_bytes: Option<usize>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            owner_name: DEFAULT_OWNER_NAME.to_string(),
            welcome_message: None,
            storage_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_stored_bytes: None,
        }
    }
}

impl ChatSettings {
    pub fn welcome_text(&self) -> String {
        if let Some(message) = &self.welcome_message {
            return message.clone();
        }

        format!(
            "Hi! I'm {}, a financial research assistant built by {}. \nI first search embedded FMCG reports and only use web sources if required.",
            self.assistant_name, self.owner_name
        )
    }

    /// Directory holding the conversation snapshot.
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
                .unwrap_or_else(|| FileStore::default().dir().to_path_buf())
        })
    }

    /// File-backed persistence configured by these settings.
    pub fn file_persistence(&self) -> StorageResult<KeyValuePersistence<FileStore>> {
        let key = StorageKey::parse(&self.storage_key)?;
        let mut store = FileStore::new(self.resolved_storage_dir());
        if let Some(limit) = self.max_stored_bytes {
            store = store.with_quota(limit);
        }
        Ok(KeyValuePersistence::new(store, key))
    }

    pub fn normalized(mut self) -> Self {
        self.assistant_name = non_blank_or(self.assistant_name, DEFAULT_ASSISTANT_NAME);
        self.owner_name = non_blank_or(self.owner_name, DEFAULT_OWNER_NAME);
        self.storage_key = non_blank_or(self.storage_key, DEFAULT_STORAGE_KEY);
        self.welcome_message = self
            .welcome_message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty());
        if self.max_input_chars == 0 {
            self.max_input_chars = DEFAULT_MAX_INPUT_CHARS;
        }
        self
    }
}

fn non_blank_or(value: String, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ChatSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".finsight"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_layered(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ChatSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_layered(path: &Path) -> ChatSettings {
        let mut figment = Figment::from(Serialized::defaults(ChatSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!(path = %path.display(), "settings file not found, using defaults");
        }
        figment = figment.merge(Env::prefixed(SETTINGS_ENV_PREFIX));

        match figment.extract::<ChatSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "failed to parse settings, using defaults"
                );
                ChatSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ChatSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = %self.config_path.display(), "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

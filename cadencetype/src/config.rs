use std::path::{Path, PathBuf};

use cadence::Configuration;
use derive_more::From;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::lessons::{LessonError, Lessons};

pub const SETTINGS_FILE: &str = "settings.toml";
pub const ENV_PREFIX: &str = "CADENCE_";

/// Which statistics strategy drives live WPM and accuracy
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Engine {
    #[default]
    Local,
    Native,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub player_name: String,
    pub data_dir: Option<PathBuf>,
    pub lessons_dir: Option<PathBuf>,
    /// Used when `RUST_LOG` is not set
    pub log_level: String,
    pub engine: Engine,
    pub session: Configuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_name: "player".to_string(),
            data_dir: None,
            lessons_dir: None,
            log_level: "info".to_string(),
            engine: Engine::default(),
            session: Configuration::default(),
        }
    }
}

#[derive(Debug, From, Error)]
pub enum ConfigError {
    #[error(
        "Failed to get configuration directory. Please specify the location using the `--config <path>` flag"
    )]
    NoDirectory,

    #[error("Failed to create directory: {0}")]
    CreateDirectory(std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(Box<figment::Error>),

    #[error("Failed to load lessons: {0}")]
    ParseLessons(LessonError),
}

#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
    pub data_dir: PathBuf,
    pub lessons: Lessons,
}

impl Config {
    /// Layer defaults, `settings.toml` and `CADENCE_` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `CADENCE_SESSION__COUNTDOWN_MS`.
    pub fn get(override_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("com", "Cadence", "CadenceType");

        let config_dir = override_path
            .clone()
            .or_else(|| dirs.as_ref().map(|dirs| dirs.config_dir().to_path_buf()))
            .ok_or(ConfigError::NoDirectory)?;

        ensure_dir(&config_dir)?;

        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        let settings_toml = config_dir.join(SETTINGS_FILE);
        if settings_toml.exists() {
            figment = figment.merge(Toml::file(settings_toml));
        }

        let mut settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        // With an explicit config directory, everything stays inside it
        let data_dir = settings
            .data_dir
            .clone()
            .or_else(|| override_path.map(|path| path.join("data")))
            .or_else(|| dirs.as_ref().map(|dirs| dirs.data_dir().to_path_buf()))
            .ok_or(ConfigError::NoDirectory)?;
        ensure_dir(&data_dir)?;
        settings.data_dir = Some(data_dir.clone());

        let lessons_dir = settings
            .lessons_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("lessons"));
        let lessons = Lessons::load(&lessons_dir)?;
        settings.lessons_dir = Some(lessons_dir);

        Ok(Self {
            settings,
            data_dir,
            lessons,
        })
    }
}

fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

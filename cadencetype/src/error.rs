use cadence::{CacheError, LobbyError};
use derive_more::From;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, From, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(ConfigError),

    #[error("Terminal error: {0}")]
    Io(std::io::Error),

    #[error("Failed to open local storage: {0}")]
    Cache(CacheError),

    #[error("Race aborted: {0}")]
    Lobby(LobbyError),

    #[error("Unknown lesson '{0}'. Run `cadencetype lessons` to list the available lessons")]
    #[from(skip)]
    UnknownLesson(String),
}

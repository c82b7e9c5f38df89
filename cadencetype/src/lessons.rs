use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use cadence::analytics::{self, Complexity};
use derive_more::From;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LESSON: &str = "home-row";

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "home-row",
        "Home Row",
        "as df jk la sad lads fall flask dash salad glass falls as a lad asks dad",
    ),
    (
        "top-row",
        "Top Row",
        "we try out your typewriter quite pretty prior to our route to the tower",
    ),
    (
        "pangrams",
        "Pangrams",
        "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.",
    ),
    (
        "numbers",
        "Numbers & Symbols",
        "Order #4521 shipped on 12/03 at 09:45; total $318.70 (incl. 15% tax) - ref: A7-22.",
    ),
    (
        "code",
        "Code",
        "fn main() { let total: u32 = (1..=10).map(|n| n * n).sum(); println!(\"{total}\"); }",
    ),
];

#[derive(Debug, From, Error)]
pub enum LessonError {
    #[error("Failed to read lessons directory '{directory}': {error}")]
    #[from(skip)]
    ReadDirectory {
        directory: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to read file: {0}")]
    ReadFile(std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseFile(toml::de::Error),

    #[error("Lesson '{0}' has no text")]
    #[from(skip)]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Lesson {
    pub fn complexity(&self) -> Complexity {
        analytics::text_complexity(&self.text)
    }
}

/// The built-in lessons, extended and overridden by `*.toml` files in the lessons directory
#[derive(Debug, Clone)]
pub struct Lessons {
    lessons: BTreeMap<String, Lesson>,
}

impl Lessons {
    pub fn builtin() -> Self {
        let lessons = BUILTIN
            .iter()
            .map(|&(id, title, text)| {
                let lesson = Lesson {
                    id: id.to_string(),
                    title: title.to_string(),
                    text: text.to_string(),
                };
                (lesson.id.clone(), lesson)
            })
            .collect();

        Self { lessons }
    }

    pub fn load(from_dir: &Path) -> Result<Self, LessonError> {
        let mut lessons = Self::builtin();

        if !from_dir.exists() {
            std::fs::create_dir_all(from_dir)?;
        }

        let files = from_dir
            .read_dir()
            .map_err(|error| LessonError::ReadDirectory {
                directory: from_dir.to_path_buf(),
                error,
            })?;

        for entry in files {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)?;
                let lesson: Lesson = toml::from_str(&content)?;
                if lesson.text.trim().is_empty() {
                    return Err(LessonError::Empty(lesson.id));
                }
                tracing::debug!(id = %lesson.id, path = %path.display(), "loaded lesson");
                lessons.lessons.insert(lesson.id.clone(), lesson);
            }
        }

        Ok(lessons)
    }

    pub fn get(&self, id: &str) -> Option<&Lesson> {
        self.lessons.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lesson> {
        self.lessons.values()
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

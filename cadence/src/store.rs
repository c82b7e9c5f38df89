//! # Store Module - Boundaries to persistence and identity
//!
//! Everything that can fail lives behind the traits in this module:
//!
//! - [DocumentStore]: remote documents keyed by `(collection path, id)`
//! - [AuthProvider]: the signed-in identity and its sign-in/sign-out lifecycle
//! - [LocalCache]: device-local durable storage, the offline fallback
//!
//! Stores push changes through [Subscription]s. Values are queued and applied by the owner when
//! it chooses, so a stale callback can never touch torn-down state: drop the subscription and
//! the store forgets it.

mod auth;
mod cache;
mod document;
mod subscription;

pub use auth::StaticAuth;
pub use cache::{FileCache, MemoryCache};
pub use document::MemoryDocumentStore;
pub use subscription::Subscription;
pub(crate) use subscription::{Watchers, subscribe};

use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{CacheError, StoreError};

pub trait DocumentStore: Debug {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the whole document
    fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// Merge top-level fields into the document, creating it if needed
    fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError>;

    /// Store a new document under a generated, insertion-ordered id
    fn add(&self, collection: &str, value: Value) -> Result<String, StoreError>;

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// The current document, followed by every later change
    fn subscribe(&self, collection: &str, id: &str)
    -> Result<Subscription<Option<Value>>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            photo_url: None,
        }
    }
}

pub trait AuthProvider: Debug {
    fn current_user(&self) -> Option<Identity>;

    /// The current identity, followed by every sign-in and sign-out
    fn subscribe(&self) -> Subscription<Option<Identity>>;
}

pub trait LocalCache: Debug {
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError>;
    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Read a typed value from `cache`
pub fn load<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Result<Option<T>, CacheError> {
    cache
        .load(key)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(CacheError::Parse)
}

/// Write a typed value to `cache`
pub fn save<T: Serialize>(cache: &dyn LocalCache, key: &str, value: &T) -> Result<(), CacheError> {
    let value = serde_json::to_value(value).map_err(CacheError::Parse)?;
    cache.store(key, &value)
}

/// Deserialize a document into `T`
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(value)?)
}

/// Serialize `T` into a document
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

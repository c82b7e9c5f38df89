use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use serde_json::Value;
use tracing::trace;

use super::{
    DocumentStore, Subscription,
    subscription::{Watchers, subscribe},
};
use crate::error::StoreError;

type Key = (String, String);

#[derive(Debug, Default)]
struct Documents {
    documents: BTreeMap<Key, Value>,
    watchers: Watchers<Key, Option<Value>>,
    next_id: u64,
    offline: bool,
}

impl Documents {
    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn changed(&mut self, key: &Key) {
        let value = self.documents.get(key).cloned();
        self.watchers.notify(|watched| watched == key, |_| value.clone());
    }
}

/// In-process [DocumentStore]. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Rc<RefCell<Documents>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with [StoreError::Disconnected] until turned back on
    pub fn set_offline(&self, offline: bool) {
        self.inner.borrow_mut().offline = offline;
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn watchers(documents: &mut Documents) -> &mut Watchers<Key, Option<Value>> {
    &mut documents.watchers
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

/// Shallow merge of top-level fields. Non-object values replace the target.
fn merge(target: &mut Value, fields: Value) {
    match (target, fields) {
        (Value::Object(target), Value::Object(fields)) => {
            for (field, value) in fields {
                target.insert(field, value);
            }
        }
        (target, fields) => *target = fields,
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.borrow();
        inner.ensure_online()?;
        Ok(inner.documents.get(&key(collection, id)).cloned())
    }

    fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_online()?;
        trace!(collection, id, "set document");

        let key = key(collection, id);
        inner.documents.insert(key.clone(), value);
        inner.changed(&key);
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_online()?;
        trace!(collection, id, "update document");

        let key = key(collection, id);
        let document = inner
            .documents
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        merge(document, fields);
        inner.changed(&key);
        Ok(())
    }

    fn add(&self, collection: &str, value: Value) -> Result<String, StoreError> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.ensure_online()?;
            inner.next_id += 1;
            format!("{:08}", inner.next_id)
        };
        self.set(collection, &id, value)?;
        Ok(id)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.inner.borrow();
        inner.ensure_online()?;
        Ok(inner
            .documents
            .iter()
            .filter(|((owner, _), _)| owner == collection)
            .map(|((_, id), value)| (id.clone(), value.clone()))
            .collect())
    }

    fn subscribe(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Subscription<Option<Value>>, StoreError> {
        let current = {
            let inner = self.inner.borrow();
            inner.ensure_online()?;
            inner.documents.get(&key(collection, id)).cloned()
        };
        Ok(subscribe(
            &self.inner,
            key(collection, id),
            Some(current),
            watchers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn update_merges_top_level_fields() {
        let store = MemoryDocumentStore::new();
        store.set("leaderboard", "u1", json!({"a": 1, "b": 2})).unwrap();
        store.update("leaderboard", "u1", json!({"b": 3, "c": 4})).unwrap();

        assert_eq!(
            store.get("leaderboard", "u1").unwrap(),
            Some(json!({"a": 1, "b": 3, "c": 4}))
        );
    }

    #[test]
    fn update_creates_missing_documents() {
        let store = MemoryDocumentStore::new();
        store.update("leaderboard", "u1", json!({"b": 3})).unwrap();
        assert_eq!(store.get("leaderboard", "u1").unwrap(), Some(json!({"b": 3})));
    }

    #[test]
    fn add_generates_ordered_ids() {
        let store = MemoryDocumentStore::new();
        let first = store.add("users/u1/sessions", json!(1)).unwrap();
        let second = store.add("users/u1/sessions", json!(2)).unwrap();
        assert!(first < second);

        let listed = store.list("users/u1/sessions").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(store.list("users/u2/sessions").unwrap().is_empty());
    }

    #[test]
    fn subscribers_see_current_and_later_values() {
        let store = MemoryDocumentStore::new();
        let subscription = store.subscribe("users/u1/progress", "main").unwrap();
        store.set("users/u1/progress", "main", json!({"xp": 5})).unwrap();
        store.set("users/u1/other", "main", json!({"xp": 9})).unwrap();

        assert_eq!(subscription.drain(), vec![None, Some(json!({"xp": 5}))]);
    }

    #[test]
    fn offline_store_rejects_calls() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("a", "b"),
            Err(StoreError::Disconnected)
        ));
        store.set_offline(false);
        assert!(store.get("a", "b").unwrap().is_none());
    }
}

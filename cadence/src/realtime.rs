//! # Realtime Module - Shared key/value tree with presence
//!
//! The lobby protocol only needs a JSON tree addressed by `/`-separated paths, last write wins
//! per path, change subscriptions, and actions the server runs when a connection drops.
//! [RealtimeStore] is that contract; [MemoryRealtime] implements it in-process, with one handle
//! per simulated connection.
//!
//! Writing `null` deletes a path, and objects left empty by a delete are pruned.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::store::{Subscription, Watchers, subscribe};

pub trait RealtimeStore: std::fmt::Debug {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Write each top-level field of `fields` under `path`
    fn update(&self, path: &str, fields: Value) -> Result<(), StoreError>;

    fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Write `value` only if nothing exists at `path`. Returns true if written.
    fn set_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    /// Have the server delete `path` when this connection drops
    fn on_disconnect_remove(&self, path: &str) -> Result<(), StoreError>;

    /// Cancel every disconnect action registered for `path`
    fn cancel_on_disconnect(&self, path: &str) -> Result<(), StoreError>;

    /// The value at `path`, followed by every change to it or below it
    fn subscribe(&self, path: &str) -> Result<Subscription<Option<Value>>, StoreError>;
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, segment| node.get(segment))
        .filter(|value| !value.is_null())
}

fn write(root: &mut Value, path: &str, value: Value) {
    let segments = segments(path);
    if value.is_null() {
        erase(root, &segments);
        return;
    }

    let mut node = root;
    for segment in segments {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = &mut node[segment];
    }
    *node = value;
}

fn erase(node: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        *node = Value::Object(Map::new());
        return;
    };
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        map.remove(*first);
    } else if let Some(child) = map.get_mut(*first) {
        erase(child, rest);
        if child.as_object().is_some_and(Map::is_empty) {
            map.remove(*first);
        }
    }
}

/// Whether a change at `changed` can affect a watcher of `watched`
fn overlaps(watched: &str, changed: &str) -> bool {
    let watched = segments(watched);
    let changed = segments(changed);
    watched
        .iter()
        .zip(changed.iter())
        .all(|(a, b)| a == b)
}

/// A subscription as the hub sees it: who watches which path
#[derive(Debug)]
struct Watch {
    connection: u64,
    path: String,
}

#[derive(Debug)]
struct Hub {
    root: Value,
    watchers: Watchers<Watch, Option<Value>>,
    on_disconnect: BTreeMap<u64, Vec<String>>,
    offline: BTreeSet<u64>,
    next_connection: u64,
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            watchers: Watchers::default(),
            on_disconnect: BTreeMap::new(),
            offline: BTreeSet::new(),
            next_connection: 0,
        }
    }
}

impl Hub {
    fn ensure_online(&self, connection: u64) -> Result<(), StoreError> {
        if self.offline.contains(&connection) {
            Err(StoreError::Disconnected)
        } else {
            Ok(())
        }
    }

    /// Apply `mutation` and notify every online watcher whose view changed
    fn mutate(&mut self, path: &str, mutation: impl FnOnce(&mut Value)) {
        let before = self.root.clone();
        mutation(&mut self.root);

        let root = &self.root;
        let offline = &self.offline;
        self.watchers.notify(
            |watch| {
                !offline.contains(&watch.connection)
                    && overlaps(&watch.path, path)
                    && lookup(&before, &watch.path) != lookup(root, &watch.path)
            },
            |watch| lookup(root, &watch.path).cloned(),
        );
    }

    /// Send the current value of every path `connection` watches
    fn resync(&mut self, connection: u64) {
        let root = &self.root;
        self.watchers.notify(
            |watch| watch.connection == connection,
            |watch| lookup(root, &watch.path).cloned(),
        );
    }
}

fn hub_watchers(hub: &mut Hub) -> &mut Watchers<Watch, Option<Value>> {
    &mut hub.watchers
}

/// In-process [RealtimeStore]. Each handle is one connection to a shared hub.
#[derive(Debug)]
pub struct MemoryRealtime {
    hub: Rc<RefCell<Hub>>,
    connection: u64,
}

impl Default for MemoryRealtime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRealtime {
    pub fn new() -> Self {
        Self::attach(Rc::new(RefCell::new(Hub::default())))
    }

    fn attach(hub: Rc<RefCell<Hub>>) -> Self {
        let connection = {
            let mut state = hub.borrow_mut();
            state.next_connection += 1;
            state.next_connection
        };
        Self { hub, connection }
    }

    /// A new connection to the same hub
    pub fn connect(&self) -> Self {
        Self::attach(self.hub.clone())
    }

    /// Drop the connection abruptly: disconnect actions run, and every call fails until
    /// [MemoryRealtime::reconnect]. Subscriptions stay registered but receive nothing while
    /// offline.
    pub fn disconnect(&self) {
        let mut hub = self.hub.borrow_mut();
        let actions = hub.on_disconnect.remove(&self.connection).unwrap_or_default();
        debug!(
            connection = self.connection,
            actions = actions.len(),
            "connection dropped"
        );

        hub.offline.insert(self.connection);
        for path in actions {
            hub.mutate(&path, |root| write(root, &path, Value::Null));
        }
    }

    /// Come back online. Each subscription of this connection receives the current value of its
    /// path, since changes made while offline were never delivered.
    pub fn reconnect(&self) {
        let mut hub = self.hub.borrow_mut();
        if hub.offline.remove(&self.connection) {
            debug!(connection = self.connection, "connection restored");
            hub.resync(self.connection);
        }
    }

    /// Disconnect actions currently registered by this connection
    pub fn pending_disconnect_actions(&self) -> usize {
        self.hub
            .borrow()
            .on_disconnect
            .get(&self.connection)
            .map_or(0, Vec::len)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.borrow().watchers.len()
    }

    fn online(&self) -> Result<std::cell::RefMut<'_, Hub>, StoreError> {
        let hub = self.hub.borrow_mut();
        hub.ensure_online(self.connection)?;
        Ok(hub)
    }
}

impl RealtimeStore for MemoryRealtime {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let hub = self.online()?;
        Ok(lookup(&hub.root, path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        trace!(connection = self.connection, path, "set");
        self.online()?
            .mutate(path, |root| write(root, path, value));
        Ok(())
    }

    fn update(&self, path: &str, fields: Value) -> Result<(), StoreError> {
        trace!(connection = self.connection, path, "update");
        self.online()?.mutate(path, |root| match fields {
            Value::Object(fields) => {
                for (field, value) in fields {
                    write(root, &format!("{path}/{field}"), value);
                }
            }
            value => write(root, path, value),
        });
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null)
    }

    fn set_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        let mut hub = self.online()?;
        if lookup(&hub.root, path).is_some() {
            return Ok(false);
        }
        hub.mutate(path, |root| write(root, path, value));
        Ok(true)
    }

    fn on_disconnect_remove(&self, path: &str) -> Result<(), StoreError> {
        let mut hub = self.online()?;
        let actions = hub.on_disconnect.entry(self.connection).or_default();
        if !actions.iter().any(|registered| registered == path) {
            actions.push(path.to_string());
        }
        Ok(())
    }

    fn cancel_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        let mut hub = self.online()?;
        if let Some(actions) = hub.on_disconnect.get_mut(&self.connection) {
            actions.retain(|registered| registered != path);
        }
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription<Option<Value>>, StoreError> {
        let current = {
            let hub = self.online()?;
            lookup(&hub.root, path).cloned()
        };
        let watch = Watch {
            connection: self.connection,
            path: path.to_string(),
        };
        Ok(subscribe(&self.hub, watch, Some(current), hub_watchers))
    }
}

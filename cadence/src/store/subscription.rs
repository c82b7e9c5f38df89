use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    sync::mpsc::{self, Receiver, Sender},
};

/// A cancellable stream of values pushed by a store.
///
/// Values are queued, never delivered through callbacks, so the owner decides when to apply
/// them. Dropping the subscription unregisters it.
pub struct Subscription<T> {
    receiver: Receiver<T>,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl<T> Subscription<T> {
    /// The next queued value, if any
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Every queued value, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Only the newest queued value, discarding older ones
    pub fn latest(&self) -> Option<T> {
        self.receiver.try_iter().last()
    }

    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Registered listeners on the store side, keyed by whatever the store watches
#[derive(Debug)]
pub(crate) struct Watchers<K, T> {
    next_id: u64,
    entries: Vec<(u64, K, Sender<T>)>,
}

impl<K, T> Default for Watchers<K, T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<K, T: Clone> Watchers<K, T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Send `value` to every watcher whose key passes `filter`.
    /// Watchers whose receiving end is gone are pruned.
    pub fn notify(&mut self, filter: impl Fn(&K) -> bool, value: impl Fn(&K) -> T) {
        self.entries.retain(|(_, key, sender)| {
            if filter(key) {
                sender.send(value(key)).is_ok()
            } else {
                true
            }
        });
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry, _, _)| *entry != id);
    }
}

/// Register a watcher on `owner` and hand back its subscription.
///
/// `watchers` projects the owner's state onto the watcher list, `initial` is queued first.
pub(crate) fn subscribe<S, K, T>(
    owner: &Rc<RefCell<S>>,
    key: K,
    initial: Option<T>,
    watchers: fn(&mut S) -> &mut Watchers<K, T>,
) -> Subscription<T>
where
    S: 'static,
    K: 'static,
    T: Clone + 'static,
{
    let (sender, receiver) = mpsc::channel();
    if let Some(initial) = initial {
        // Receiver is alive, the send cannot fail
        let _ = sender.send(initial);
    }

    let id = {
        let mut state = owner.borrow_mut();
        let list = watchers(&mut state);
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push((id, key, sender));
        id
    };

    let weak: Weak<RefCell<S>> = Rc::downgrade(owner);
    Subscription {
        receiver,
        cancel: Some(Box::new(move || {
            if let Some(owner) = weak.upgrade() {
                watchers(&mut owner.borrow_mut()).remove(id);
            }
        })),
    }
}

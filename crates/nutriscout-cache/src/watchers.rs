use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::watch;

/// Live channels keyed by whatever the observer asked for
///
/// A sender only exists while somebody holds a receiver for it. Senders
/// whose receivers are all gone get dropped the next time we publish.
pub(crate) struct Watchers<K, V> {
    senders: HashMap<K, watch::Sender<V>>,
}

impl<K: Hash + Eq + Clone, V> Watchers<K, V> {
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    /// Join an existing channel, or open one seeded with `current()`
    pub fn subscribe<E>(
        &mut self,
        key: K,
        current: impl FnOnce() -> Result<V, E>,
    ) -> Result<watch::Receiver<V>, E> {
        if let Some(sender) = self.senders.get(&key) {
            if sender.receiver_count() > 0 {
                return Ok(sender.subscribe());
            }
        }

        let (sender, receiver) = watch::channel(current()?);
        self.senders.insert(key, sender);
        Ok(receiver)
    }

    pub fn publish(&mut self, key: &K, value: V) {
        if let Some(sender) = self.senders.get(key) {
            if sender.receiver_count() == 0 {
                self.senders.remove(key);
            } else {
                sender.send_replace(value);
            }
        }
    }

    /// Keys somebody is still listening on
    pub fn watched_keys(&mut self) -> Vec<K> {
        self.senders.retain(|_, sender| sender.receiver_count() > 0);
        self.senders.keys().cloned().collect()
    }
}

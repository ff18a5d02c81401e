//! The topic tree node (spec §4.F, §3 "Topic").
//!
//! A `Topic` owns its MDS and its listener set, but not its children: the
//! tree itself is an arena keyed by [`TopicName`] and owned by
//! [`crate::manager::TopicManager`] (spec §9 Design Notes: "avoid owning
//! cycles entirely" by looking the parent up by name through the topic
//! map). That keeps child destruction, parent lookups and traversal all
//! name-indexed instead of requiring `Rc`/`Weak` back-references between
//! nodes.

use indexmap::{IndexMap, IndexSet};
use pubsub_core::TopicName;

use crate::{
    argspec::ArgsInfo,
    listener::{Listener, ListenerKey},
};

/// Default description for a topic created without an explicit spec.
pub const UNDOCUMENTED_LEAF: &str = "UNDOCUMENTED: created without spec";
/// Default description for an intermediate topic implicitly created while
/// reaching a deeper one.
pub const UNDOCUMENTED_PARENT: &str = "UNDOCUMENTED: created as parent without specification";

#[derive(Clone, Debug)]
pub struct Topic {
    pub name: TopicName,
    pub parent: Option<TopicName>,
    pub children: IndexSet<TopicName>,
    pub description: String,
    pub args_info: ArgsInfo,
    listeners: IndexMap<ListenerKey, Listener>,
}

impl Topic {
    #[must_use]
    pub fn new(name: TopicName, parent: Option<TopicName>, description: String, args_info: ArgsInfo) -> Self {
        Self {
            name,
            parent,
            children: IndexSet::new(),
            description,
            args_info,
            listeners: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn has_mds(&self) -> bool {
        self.args_info.is_complete()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners(&self) -> impl Iterator<Item = &Listener> {
        self.listeners.values()
    }

    #[must_use]
    pub fn find_listener(&self, key: ListenerKey) -> Option<&Listener> {
        self.listeners.get(&key)
    }

    #[must_use]
    pub fn find_listener_mut(&mut self, key: ListenerKey) -> Option<&mut Listener> {
        self.listeners.get_mut(&key)
    }

    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.insert(listener.key(), listener);
    }

    pub fn remove_listener(&mut self, key: ListenerKey) -> Option<Listener> {
        self.listeners.shift_remove(&key)
    }

    /// Removes every listener whose backing callable has been dropped.
    /// Returns the removed listeners so the caller can fire
    /// `notify_dead_listener` for each.
    pub fn sweep_dead(&mut self) -> Vec<Listener> {
        let dead: Vec<ListenerKey> = self
            .listeners
            .iter()
            .filter(|(_, l)| !l.is_alive())
            .map(|(k, _)| *k)
            .collect();
        dead.into_iter()
            .filter_map(|k| self.listeners.shift_remove(&k))
            .collect()
    }

    /// Snapshot of the current listener set, for dispatch (spec §4.F
    /// `__sendMessage`: "iterate a snapshot copy ... concurrent modification
    /// must not throw").
    #[must_use]
    pub fn snapshot_listeners(&self) -> Vec<Listener> {
        self.listeners.values().cloned().collect()
    }

    /// Removes and returns every listener, for topic destruction.
    pub fn take_all_listeners(&mut self) -> Vec<Listener> {
        self.listeners.drain(..).map(|(_, l)| l).collect()
    }
}

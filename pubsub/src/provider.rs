//! Topic-definition providers (spec §4.H): pluggable sources of
//! `(description, MDS)` pairs consulted lazily, only when a topic is first
//! created.

use std::sync::Arc;

use pubsub_core::TopicName;

use crate::argspec::ArgSpec;

/// A source of topic definitions. Implementations might read a class tree,
/// an indented source string, or (outside this crate's scope, per spec §1)
/// an XML/YAML file.
pub trait TopicDefnProvider: Send + Sync {
    /// Returns `(description, spec)` for `name`, or `(None, None)` if this
    /// provider has no definition for it.
    fn get_defn(&self, name: &TopicName) -> (Option<String>, Option<ArgSpec>);

    /// All topic names this provider can define, for bulk instantiation via
    /// `instantiate_all_defined_topics`.
    fn topic_names(&self) -> Vec<TopicName>;

    /// A human-readable dump of everything this provider defines.
    fn get_tree_doc(&self) -> String;
}

/// An ordered, idempotent registry of providers (spec §4.H: "`addDefnProvider`
/// is idempotent"; "lookup order is registration order; the first provider
/// returning a non-null pair wins").
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn TopicDefnProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider`. Registering the same instance twice (by `Arc`
    /// pointer identity) has the effect of one registration.
    pub fn add(&mut self, provider: Arc<dyn TopicDefnProvider>) {
        if !self
            .providers
            .iter()
            .any(|p| Arc::ptr_eq(p, &provider))
        {
            self.providers.push(provider);
        }
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the first non-`(None, None)` definition found, in
    /// registration order.
    #[must_use]
    pub fn get_defn(&self, name: &TopicName) -> (Option<String>, Option<ArgSpec>) {
        for provider in &self.providers {
            let defn = provider.get_defn(name);
            if defn.0.is_some() || defn.1.is_some() {
                return defn;
            }
        }
        (None, None)
    }

    /// All topic names known across every registered provider, in
    /// registration order, without duplicates.
    #[must_use]
    pub fn all_topic_names(&self) -> Vec<TopicName> {
        let mut seen = indexmap::IndexSet::new();
        for provider in &self.providers {
            for name in provider.topic_names() {
                seen.insert(name);
            }
        }
        seen.into_iter().collect()
    }
}

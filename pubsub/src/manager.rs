//! The topic manager (spec §4.G): global topic naming, lookup, creation and
//! deletion, owning the `ALL_TOPICS` root and the registered
//! topic-definition providers.

use std::sync::Arc;

use indexmap::IndexMap;
use pubsub_core::TopicName;

use crate::{
    argspec::{ArgSpec, ArgsInfo},
    callable::{CallArgsInfo, PubsubListener},
    data::MsgData,
    error::{PubsubError, Result},
    listener::{validate as validate_listener, Listener, ListenerKey},
    notify::NotificationManager,
    provider::ProviderRegistry,
    topic::{Topic, UNDOCUMENTED_LEAF, UNDOCUMENTED_PARENT},
};

/// A lightweight, `Copy`-able reference to a subscribed listener — what
/// `subscribe`/`unsubscribe` hand back to callers instead of a borrow into
/// the manager's internal listener map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerHandle {
    pub key: ListenerKey,
    pub identity: String,
}

pub struct TopicManager {
    topics: IndexMap<TopicName, Topic>,
    providers: ProviderRegistry,
    pub notify: NotificationManager,
    raise_on_topic_unspecified: bool,
}

impl Default for TopicManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicManager {
    #[must_use]
    pub fn new() -> Self {
        let root_name = TopicName::root();
        let mut topics = IndexMap::new();
        let mut root_args = ArgsInfo::incomplete();
        // The root is immutable and carries no parameters (spec §4.C:
        // "the given spec must be COMPLETE (the root is immutable)").
        root_args
            .finalize(&ArgSpec::new(), &root_name, None)
            .expect("an empty ArgSpec always finalizes");
        topics.insert(
            root_name.clone(),
            Topic::new(root_name, None, "The root of all topics".to_owned(), root_args),
        );
        Self {
            topics,
            providers: ProviderRegistry::new(),
            notify: NotificationManager::new(),
            raise_on_topic_unspecified: false,
        }
    }

    #[must_use]
    pub fn root_name(&self) -> TopicName {
        TopicName::root()
    }

    #[must_use]
    pub fn get(&self, name: &TopicName) -> Option<&Topic> {
        self.topics.get(name)
    }

    #[must_use]
    pub fn get_mut(&mut self, name: &TopicName) -> Option<&mut Topic> {
        self.topics.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &TopicName) -> bool {
        self.topics.contains_key(name)
    }

    pub fn providers_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.providers
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// `getTopic` (spec §4.G): returns the existing topic, or
    /// `TopicNameError`/`None` if missing, depending on `ok_if_none`.
    pub fn require(&self, name: &TopicName, ok_if_none: bool) -> Result<Option<&Topic>> {
        match self.topics.get(name) {
            Some(t) => Ok(Some(t)),
            None if ok_if_none => Ok(None),
            None => Err(PubsubError::TopicNotFound(name.clone())),
        }
    }

    #[must_use]
    pub fn raise_on_topic_unspecified(&self) -> bool {
        self.raise_on_topic_unspecified
    }

    /// `setTopicUnspecifiedFatal` (spec §4.I). Returns the previous value.
    pub fn set_topic_unspecified_fatal(&mut self, new: bool, check_existing: bool) -> Result<bool> {
        let previous = self.raise_on_topic_unspecified;
        if new && check_existing {
            self.check_all_topics_have_mds()?;
        }
        self.raise_on_topic_unspecified = new;
        Ok(previous)
    }

    pub fn check_all_topics_have_mds(&self) -> Result<()> {
        for (name, topic) in &self.topics {
            if !topic.has_mds() {
                return Err(PubsubError::TopicDefn(name.clone()));
            }
        }
        Ok(())
    }

    /// The nearest ancestor with a COMPLETE MDS, walking up from `name`'s
    /// parent. `name` itself is not considered.
    fn nearest_complete_ancestor(&self, name: &TopicName) -> Option<&ArgsInfo> {
        let mut cur = name.parent();
        while let Some(n) = cur {
            if let Some(t) = self.topics.get(&n) {
                if t.has_mds() {
                    return Some(&t.args_info);
                }
            }
            cur = n.parent();
        }
        None
    }

    /// Finalizes `name`'s MDS against `given`, then recursively re-validates
    /// and recomputes `addedToParent` for every COMPLETE descendant, and
    /// recurses (without finalizing) into INCOMPLETE descendants (spec
    /// §4.C Finalize step 4).
    fn finalize_topic(&mut self, name: &TopicName, given: &ArgSpec) -> Result<()> {
        let parent_info = self.nearest_complete_ancestor(name).cloned();
        let topic = self
            .topics
            .get_mut(name)
            .ok_or_else(|| PubsubError::TopicNotFound(name.clone()))?;
        topic.args_info.finalize(given, name, parent_info.as_ref())?;
        self.revalidate_descendants(name)
    }

    fn revalidate_descendants(&mut self, name: &TopicName) -> Result<()> {
        let children: Vec<TopicName> = self
            .topics
            .get(name)
            .map(|t| t.children.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            let is_complete = self.topics.get(&child).is_some_and(Topic::has_mds);
            if is_complete {
                let given = {
                    let t = &self.topics[&child];
                    ArgSpec {
                        required: t.args_info.required.iter().cloned().collect(),
                        optional: t.args_info.optional.iter().cloned().collect(),
                        docs: t.args_info.docs.clone(),
                    }
                };
                self.finalize_topic(&child, &given)?;
            } else {
                self.revalidate_descendants(&child)?;
            }
        }
        Ok(())
    }

    fn link_child(&mut self, parent: &TopicName, child: &TopicName) {
        if let Some(p) = self.topics.get_mut(parent) {
            p.children.insert(child.clone());
        }
    }

    /// `getOrCreateTopic` (spec §4.G): ensures `name` and every ancestor
    /// prefix exist, consulting providers and (for the final segment) the
    /// given `prototype` signature, in that order. Intermediate ancestors
    /// get a default, undocumented, INCOMPLETE MDS unless a provider defines
    /// them.
    pub fn get_or_create_topic(
        &mut self,
        name: &TopicName,
        prototype: Option<&CallArgsInfo>,
        from_subscribe: bool,
        inline_spec: Option<ArgSpec>,
    ) -> Result<()> {
        if self.topics.contains_key(name) {
            return Ok(());
        }
        let parts = name.parts();
        let mut prefix = TopicName::root();
        for (i, part) in parts.iter().enumerate() {
            let full = prefix.child(part.as_str())?;
            if !self.topics.contains_key(&full) {
                self.create_one(&full, i == parts.len() - 1, prototype, from_subscribe, inline_spec.clone())?;
            }
            prefix = full;
        }
        Ok(())
    }

    fn create_one(
        &mut self,
        name: &TopicName,
        is_final: bool,
        prototype: Option<&CallArgsInfo>,
        from_subscribe: bool,
        inline_spec: Option<ArgSpec>,
    ) -> Result<()> {
        let parent_name = name.parent();
        let (provider_desc, provider_spec) = self.providers.get_defn(name);

        let (description, spec): (String, Option<ArgSpec>) = if let Some(spec) = inline_spec {
            (
                provider_desc.unwrap_or_else(|| UNDOCUMENTED_LEAF.to_owned()),
                Some(spec),
            )
        } else if provider_spec.is_some() || provider_desc.is_some() {
            let desc = provider_desc.unwrap_or_else(|| UNDOCUMENTED_LEAF.to_owned());
            (desc, provider_spec)
        } else if is_final && prototype.is_some() {
            let proto = prototype.expect("checked Some above");
            let mut spec = ArgSpec::new()
                .with_required(proto.required_args.clone())
                .with_optional(proto.optional_args.clone());
            spec.fill_placeholder_docs();
            (UNDOCUMENTED_LEAF.to_owned(), Some(spec))
        } else if !from_subscribe && self.raise_on_topic_unspecified {
            return Err(PubsubError::TopicDefn(name.clone()));
        } else {
            let desc = if is_final {
                UNDOCUMENTED_LEAF.to_owned()
            } else {
                UNDOCUMENTED_PARENT.to_owned()
            };
            (desc, None)
        };

        let args_info = ArgsInfo::incomplete();
        self.topics.insert(
            name.clone(),
            Topic::new(name.clone(), parent_name.clone(), description.clone(), args_info),
        );
        if let Some(parent) = &parent_name {
            self.link_child(parent, name);
        }

        if let Some(spec) = spec {
            self.finalize_topic(name, &spec)?;
        }

        let topic = &self.topics[name];
        let required: Vec<String> = topic.args_info.required.iter().cloned().collect();
        let optional_docs = topic.args_info.docs.clone();
        log::debug!("Created topic '{name}'");
        self.notify
            .notify_new_topic(name, &description, &required, &optional_docs);
        Ok(())
    }

    /// `delTopic` (spec §4.G / §3 Lifecycle): recursively destroys `name`
    /// and its descendants, unsubscribing every affected listener. The root
    /// can never be destroyed.
    pub fn del_topic(&mut self, name: &TopicName) -> Result<()> {
        if name.is_root() {
            return Ok(());
        }
        if !self.topics.contains_key(name) {
            return Ok(());
        }
        let children: Vec<TopicName> = self
            .topics
            .get(name)
            .map(|t| t.children.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            self.del_topic(&child)?;
        }

        if let Some(mut topic) = self.topics.shift_remove(name) {
            for listener in topic.take_all_listeners() {
                self.notify.notify_unsubscribe(listener.identity(), name);
            }
            if let Some(parent) = &topic.parent {
                if let Some(p) = self.topics.get_mut(parent) {
                    p.children.shift_remove(name);
                }
            }
        }
        self.notify.notify_del_topic(name);
        Ok(())
    }

    /// Destroys every child of the root, leaving the root itself intact.
    pub fn clear_tree(&mut self) -> Result<()> {
        let root = TopicName::root();
        let children: Vec<TopicName> = self
            .topics
            .get(&root)
            .map(|t| t.children.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            self.del_topic(&child)?;
        }
        Ok(())
    }

    /// Subscribes `callable` (declaring `info`, with `curried` fixed
    /// arguments) to `name`, auto-creating the topic (and deriving its MDS
    /// from `info` if it has none) as needed (spec §4.F `subscribe`).
    pub fn subscribe(
        &mut self,
        name: &TopicName,
        callable: &Arc<dyn PubsubListener>,
        info: CallArgsInfo,
        curried: MsgData,
    ) -> Result<(ListenerHandle, bool)> {
        self.get_or_create_topic(name, Some(&info), true, None)?;
        let key = ListenerKey::of(callable);

        if self.topics[name].find_listener(key).is_some() {
            let topic = self.topics.get_mut(name).expect("just checked");
            if !curried.is_empty() {
                topic
                    .find_listener_mut(key)
                    .expect("just checked")
                    .set_curried_args(curried)?;
            }
            let listener = topic.find_listener(key).expect("just checked");
            let handle = ListenerHandle {
                key,
                identity: listener.identity().to_owned(),
            };
            self.notify.notify_subscribe(&handle.identity, name, false);
            return Ok((handle, false));
        }

        if !self.topics[name].has_mds() {
            let curried_keys = curried.key_set();
            let mut spec = ArgSpec::new()
                .with_required(info.excluding(&curried_keys).required_args.clone())
                .with_optional(info.excluding(&curried_keys).optional_args.clone());
            spec.fill_placeholder_docs();
            self.finalize_topic(name, &spec)?;
        }

        let topic = &self.topics[name];
        let curried_keys = curried.key_set();
        validate_listener(&topic.args_info.required, &topic.args_info.optional, &info, &curried_keys).map_err(
            |message| PubsubError::ListenerMismatch {
                topic: name.clone(),
                message,
            },
        )?;

        let listener = Listener::new(callable, info, curried);
        let handle = ListenerHandle {
            key,
            identity: listener.identity().to_owned(),
        };
        self.topics.get_mut(name).expect("created above").add_listener(listener);
        log::debug!("Subscribed '{}' to topic '{name}'", handle.identity);
        self.notify.notify_subscribe(&handle.identity, name, true);
        Ok((handle, true))
    }

    /// `unsubscribe` (spec §4.F): removes `key` from `name`'s listener set.
    pub fn unsubscribe(&mut self, name: &TopicName, key: ListenerKey) -> Result<Option<ListenerHandle>> {
        let Some(topic) = self.topics.get_mut(name) else {
            return Ok(None);
        };
        let Some(listener) = topic.remove_listener(key) else {
            return Ok(None);
        };
        let handle = ListenerHandle {
            key,
            identity: listener.identity().to_owned(),
        };
        log::debug!("Unsubscribed '{}' from topic '{name}'", handle.identity);
        self.notify.notify_unsubscribe(&handle.identity, name);
        Ok(Some(handle))
    }

    /// `unsubAll` (spec §6): removes every listener across every topic (or
    /// just `topic_name`, if given) for which `listener_filter` returns
    /// true (default: accept all).
    pub fn unsub_all(
        &mut self,
        topic_name: Option<&TopicName>,
        listener_filter: Option<&dyn Fn(&Listener) -> bool>,
    ) -> Vec<(TopicName, ListenerHandle)> {
        let targets: Vec<TopicName> = match topic_name {
            Some(n) => vec![n.clone()],
            None => self.topics.keys().cloned().collect(),
        };
        let mut removed = Vec::new();
        for name in targets {
            let Some(topic) = self.topics.get(&name) else {
                continue;
            };
            let keys: Vec<ListenerKey> = topic
                .listeners()
                .filter(|l| listener_filter.map_or(true, |f| f(l)))
                .map(Listener::key)
                .collect();
            for key in keys {
                if let Ok(Some(handle)) = self.unsubscribe(&name, key) {
                    removed.push((name.clone(), handle));
                }
            }
        }
        removed
    }

    #[must_use]
    pub fn is_subscribed(&self, name: &TopicName, key: ListenerKey) -> bool {
        self.topics
            .get(name)
            .is_some_and(|t| t.find_listener(key).is_some())
    }

    /// `isValid`/`validate` (spec §6): whether `info` (with `curried` names
    /// fixed) satisfies `name`'s MDS.
    pub fn validate_signature(
        &self,
        name: &TopicName,
        info: &CallArgsInfo,
        curried: &indexmap::IndexSet<String>,
    ) -> Result<()> {
        let topic = self
            .topics
            .get(name)
            .ok_or_else(|| PubsubError::TopicNotFound(name.clone()))?;
        validate_listener(&topic.args_info.required, &topic.args_info.optional, info, curried).map_err(|message| {
            PubsubError::ListenerMismatch {
                topic: name.clone(),
                message,
            }
        })
    }

    /// Sweeps dead listeners from `name`'s topic (if it exists), firing
    /// `notify_dead_listener` for each.
    pub fn sweep_dead(&mut self, name: &TopicName) {
        let Some(topic) = self.topics.get_mut(name) else {
            return;
        };
        let dead = topic.sweep_dead();
        for listener in dead {
            self.notify.notify_dead_listener(listener.identity(), name);
        }
    }

    /// A plain-text dump of the tree: name, description, required/optional
    /// parameters — the one format-free exporter this design keeps (spec
    /// §6 `exportTopicTreeSpec`; see `SPEC_FULL.md` §6 for why it carries no
    /// serialization format).
    #[must_use]
    pub fn export_topic_tree_spec(&self, module_doc: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(doc) = module_doc {
            out.push_str(doc);
            out.push_str("\n\n");
        }
        let mut names: Vec<&TopicName> = self.topics.keys().collect();
        names.sort_by(|a, b| a.stringize().cmp(&b.stringize()));
        for name in names {
            let topic = &self.topics[name];
            let depth = name.parts().len().saturating_sub(1);
            let indent = "    ".repeat(depth);
            out.push_str(&format!("{indent}{} -- {}\n", name.leaf(), topic.description));
            for req in &topic.args_info.required {
                let doc = topic.args_info.docs.get(req).map_or("", String::as_str);
                out.push_str(&format!("{indent}    {req} (required) -- {doc}\n"));
            }
            for opt in &topic.args_info.optional {
                let doc = topic.args_info.docs.get(opt).map_or("", String::as_str);
                out.push_str(&format!("{indent}    {opt} -- {doc}\n"));
            }
        }
        out
    }
}

//! The notification manager (spec §4.J): a flag-gated dispatcher of
//! broker-activity events to registered handlers.

use std::sync::Arc;

use indexmap::IndexMap;
use pubsub_core::TopicName;

/// Which stage of a `send_message` a `notify_send` call represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStage {
    /// Before any listener on the target topic or its ancestors is invoked.
    Pre,
    /// Immediately before invoking one particular listener.
    In,
    /// After the last listener (of the target topic or its ancestors) has
    /// returned, or dispatch aborted.
    Post,
}

/// An observer of broker activity. All methods have empty default bodies so
/// handlers only implement the events they care about.
pub trait NotificationHandler: Send + Sync {
    fn notify_subscribe(&self, _listener_id: &str, _topic: &TopicName, _new_sub: bool) {}
    fn notify_unsubscribe(&self, _listener_id: &str, _topic: &TopicName) {}
    fn notify_dead_listener(&self, _listener_id: &str, _topic: &TopicName) {}
    fn notify_send(&self, _stage: SendStage, _topic: &TopicName, _listener_id: Option<&str>) {}
    fn notify_new_topic(
        &self,
        _topic: &TopicName,
        _description: &str,
        _required: &[String],
        _optional_docs: &IndexMap<String, String>,
    ) {
    }
    fn notify_del_topic(&self, _topic: &TopicName) {}
}

/// Which notification kinds are currently enabled. All default to `false`:
/// notifications are an opt-in diagnostic/integration feature, not part of
/// normal dispatch overhead (spec §4.J).
#[derive(Clone, Copy, Debug, Default)]
pub struct NotificationFlags {
    pub subscribe: bool,
    pub unsubscribe: bool,
    pub dead_listener: bool,
    pub send_message: bool,
    pub new_topic: bool,
    pub del_topic: bool,
}

impl NotificationFlags {
    #[must_use]
    pub fn all(enabled: bool) -> Self {
        Self {
            subscribe: enabled,
            unsubscribe: enabled,
            dead_listener: enabled,
            send_message: enabled,
            new_topic: enabled,
            del_topic: enabled,
        }
    }
}

/// Per-flag overrides for [`NotificationManager::set_flag_states`]. `all`,
/// if given, is applied first; individual `Some` fields override it (spec
/// §4.J: "`setFlagStates(**)` accepts an `all` meta-key applied first, then
/// individual overrides").
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagStateUpdate {
    pub all: Option<bool>,
    pub subscribe: Option<bool>,
    pub unsubscribe: Option<bool>,
    pub dead_listener: Option<bool>,
    pub send_message: Option<bool>,
    pub new_topic: Option<bool>,
    pub del_topic: Option<bool>,
}

#[derive(Default)]
pub struct NotificationManager {
    flags: NotificationFlags,
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

impl NotificationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.push(handler);
    }

    pub fn clear_handlers(&mut self) {
        self.handlers.clear();
    }

    #[must_use]
    pub fn flags(&self) -> NotificationFlags {
        self.flags
    }

    pub fn set_flag_states(&mut self, update: FlagStateUpdate) {
        if let Some(all) = update.all {
            self.flags = NotificationFlags::all(all);
        }
        if let Some(v) = update.subscribe {
            self.flags.subscribe = v;
        }
        if let Some(v) = update.unsubscribe {
            self.flags.unsubscribe = v;
        }
        if let Some(v) = update.dead_listener {
            self.flags.dead_listener = v;
        }
        if let Some(v) = update.send_message {
            self.flags.send_message = v;
        }
        if let Some(v) = update.new_topic {
            self.flags.new_topic = v;
        }
        if let Some(v) = update.del_topic {
            self.flags.del_topic = v;
        }
    }

    pub fn notify_subscribe(&self, listener_id: &str, topic: &TopicName, new_sub: bool) {
        if !self.flags.subscribe {
            return;
        }
        for h in &self.handlers {
            h.notify_subscribe(listener_id, topic, new_sub);
        }
    }

    pub fn notify_unsubscribe(&self, listener_id: &str, topic: &TopicName) {
        if !self.flags.unsubscribe {
            return;
        }
        for h in &self.handlers {
            h.notify_unsubscribe(listener_id, topic);
        }
    }

    pub fn notify_dead_listener(&self, listener_id: &str, topic: &TopicName) {
        if !self.flags.dead_listener {
            return;
        }
        for h in &self.handlers {
            h.notify_dead_listener(listener_id, topic);
        }
    }

    pub fn notify_send(&self, stage: SendStage, topic: &TopicName, listener_id: Option<&str>) {
        if !self.flags.send_message {
            return;
        }
        for h in &self.handlers {
            h.notify_send(stage, topic, listener_id);
        }
    }

    pub fn notify_new_topic(
        &self,
        topic: &TopicName,
        description: &str,
        required: &[String],
        optional_docs: &IndexMap<String, String>,
    ) {
        if !self.flags.new_topic {
            return;
        }
        for h in &self.handlers {
            h.notify_new_topic(topic, description, required, optional_docs);
        }
    }

    pub fn notify_del_topic(&self, topic: &TopicName) {
        if !self.flags.del_topic {
            return;
        }
        for h in &self.handlers {
            h.notify_del_topic(topic);
        }
    }
}

//! Listener callables and their declared call signature.
//!
//! Rust callables carry no runtime parameter-name metadata, so unlike the
//! reflective original this design does not introspect an arbitrary closure
//! (spec §4.B). Instead a subscriber declares its [`CallArgsInfo`] explicitly
//! through the [`ListenerSpec`] builder at subscribe time — the redesign
//! spec §9 itself recommends for statically typed targets.

use indexmap::IndexSet;
use pubsub_core::TopicName;

use crate::{data::MsgData, error::ListenerError};

/// Anything that can be subscribed to a topic. Implemented for plain
/// closures via the blanket impl below, so most callers never name this
/// trait directly.
pub trait PubsubListener: Send + Sync {
    /// Invoked with the message data (filtered to the receiving topic's MDS,
    /// or the full sender payload if this listener accepts all keyword
    /// arguments), the topic the message was delivered through, and the
    /// original, unfiltered sender payload.
    fn call(&self, data: &MsgData, topic: &TopicName, all_data: &MsgData) -> Result<(), ListenerError>;
}

impl<F> PubsubListener for F
where
    F: Fn(&MsgData, &TopicName, &MsgData) -> Result<(), ListenerError> + Send + Sync,
{
    fn call(&self, data: &MsgData, topic: &TopicName, all_data: &MsgData) -> Result<(), ListenerError> {
        self(data, topic, all_data)
    }
}

/// A listener's declared call signature: which parameter names it requires,
/// which it accepts optionally, whether it accepts the sender's entire
/// payload regardless of the topic's MDS, and which parameter (if any)
/// should receive the delivering [`TopicName`] (the `AUTO_TOPIC` redesign).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallArgsInfo {
    pub required_args: Vec<String>,
    pub optional_args: Vec<String>,
    pub accepts_all_kwargs: bool,
    pub auto_topic_arg_name: Option<String>,
}

impl CallArgsInfo {
    /// `requiredArgs ++ optionalArgs`, order preserved (spec §4.B).
    #[must_use]
    pub fn all_params(&self) -> IndexSet<String> {
        self.required_args
            .iter()
            .chain(self.optional_args.iter())
            .cloned()
            .collect()
    }

    /// Returns a copy with `ignore` names removed from both lists (used when
    /// a topic's MDS is derived from a subscriber's signature: curried names
    /// are excluded, since the sender never supplies them — spec §4.B, §4.F).
    #[must_use]
    pub fn excluding(&self, ignore: &IndexSet<String>) -> Self {
        Self {
            required_args: self
                .required_args
                .iter()
                .filter(|n| !ignore.contains(n.as_str()))
                .cloned()
                .collect(),
            optional_args: self
                .optional_args
                .iter()
                .filter(|n| !ignore.contains(n.as_str()))
                .cloned()
                .collect(),
            accepts_all_kwargs: self.accepts_all_kwargs,
            auto_topic_arg_name: self.auto_topic_arg_name.clone(),
        }
    }
}

/// Builder for a [`CallArgsInfo`], the explicit stand-in for reflective
/// signature introspection.
#[derive(Clone, Debug, Default)]
pub struct ListenerSpec {
    info: CallArgsInfo,
}

impl ListenerSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.required_args = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn optional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.optional_args = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn accepts_all_kwargs(mut self, yes: bool) -> Self {
        self.info.accepts_all_kwargs = yes;
        self
    }

    #[must_use]
    pub fn auto_topic_arg(mut self, name: impl Into<String>) -> Self {
        self.info.auto_topic_arg_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> CallArgsInfo {
        self.info
    }
}

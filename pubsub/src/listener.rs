//! The listener wrapper (spec §4.D) and validator (spec §4.E).

use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use pubsub_core::TopicName;

use crate::{
    callable::{CallArgsInfo, PubsubListener},
    data::{MsgData, MsgValue},
    error::{ListenerError, PubsubError, Result},
};

/// Stable identity for a subscribed callable, derived from the `Arc`'s data
/// pointer before any weak-reference step, so a dead listener remains
/// identifiable (spec §3 "Listener").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(usize);

impl ListenerKey {
    #[must_use]
    pub fn of(listener: &Arc<dyn PubsubListener>) -> Self {
        Self(Arc::as_ptr(listener).cast::<()>() as usize)
    }
}

/// The outcome of attempting to invoke a listener.
pub enum CallOutcome {
    Invoked,
    /// The wrapped callable has been dropped; the caller should detach this
    /// listener and fire `notify_dead_listener`.
    Dead,
    Failed(ListenerError),
}

/// A subscribed listener: a weak reference to the user's callable, its
/// declared call signature, and any curried (subscribe-time-fixed)
/// arguments.
///
/// Cheaply `Clone`-able (it only ever holds a `Weak` to the actual
/// callable), so the broker can take snapshot copies of a topic's listener
/// set before dispatching — per spec §4.F, listeners may subscribe or
/// unsubscribe *any* listener during dispatch, and iterating a snapshot
/// means that never invalidates the in-flight iteration.
#[derive(Clone)]
pub struct Listener {
    weak: Weak<dyn PubsubListener>,
    key: ListenerKey,
    identity: String,
    pub call_args_info: CallArgsInfo,
    curried: MsgData,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("identity", &self.identity)
            .finish()
    }
}

impl Listener {
    #[must_use]
    pub fn new(callable: &Arc<dyn PubsubListener>, call_args_info: CallArgsInfo, curried: MsgData) -> Self {
        let key = ListenerKey::of(callable);
        let identity = format!("listener-{:08x}", key.0 & 0xFFFF_FFFF);
        Self {
            weak: Arc::downgrade(callable),
            key,
            identity,
            call_args_info,
            curried,
        }
    }

    #[must_use]
    pub fn key(&self) -> ListenerKey {
        self.key
    }

    /// Name + a short address suffix, for logs and dead-listener reports
    /// (spec §3 "Listener").
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Rust gives us no death callback; death is observed lazily, by a
    /// failed upgrade at the next call attempt (spec §4.A, §9 redesign).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.weak.strong_count() > 0
    }

    #[must_use]
    pub fn curried_key_set(&self) -> IndexSet<String> {
        self.curried.key_set()
    }

    /// Updates the curried argument *values*, keeping the key set fixed
    /// (spec §4.D `setCurriedArgs`). Fails if the new key set differs from
    /// the one already registered.
    pub fn set_curried_args(&mut self, new_curried: MsgData) -> Result<()> {
        if self.curried.key_set() != new_curried.key_set() {
            return Err(PubsubError::CurriedArgMismatch(format!(
                "listener '{}' was subscribed with curried keys {:?}, cannot re-subscribe with {:?}",
                self.identity,
                self.curried.key_set(),
                new_curried.key_set()
            )));
        }
        self.curried = new_curried;
        Ok(())
    }

    /// Invokes the wrapped callable with `filtered` (or `all_data` if this
    /// listener accepts all keyword arguments), curried args merged on top,
    /// and the `AUTO_TOPIC` parameter injected last if declared (spec §4.D
    /// `call`).
    pub fn call(&self, filtered: &MsgData, topic: &TopicName, all_data: &MsgData) -> CallOutcome {
        let Some(strong) = self.weak.upgrade() else {
            return CallOutcome::Dead;
        };

        let mut chosen = if self.call_args_info.accepts_all_kwargs {
            all_data.clone()
        } else {
            filtered.clone()
        };
        if !self.curried.is_empty() {
            chosen.merge_over(&self.curried);
        }
        if let Some(name) = &self.call_args_info.auto_topic_arg_name {
            chosen.insert(name.clone(), MsgValue::Any(Arc::new(topic.clone())));
        }

        match strong.call(&chosen, topic, all_data) {
            Ok(()) => CallOutcome::Invoked,
            Err(e) => CallOutcome::Failed(e),
        }
    }
}

/// Detailed reasons a listener's signature does not satisfy a topic's MDS
/// (spec §4.E).
#[derive(Debug, Default)]
pub struct ValidationFailure {
    /// Topic parameters the listener's signature doesn't declare at all.
    pub missing_from_listener: Vec<String>,
    /// Listener-required parameters the topic doesn't supply and that
    /// aren't curried.
    pub unexpectedly_required: Vec<String>,
    /// Curried names that either aren't in the listener's signature, or
    /// collide with the topic's own required/optional names.
    pub bad_curried: Vec<String>,
}

impl ValidationFailure {
    fn is_empty(&self) -> bool {
        self.missing_from_listener.is_empty()
            && self.unexpectedly_required.is_empty()
            && self.bad_curried.is_empty()
    }

    fn into_message(self) -> String {
        let mut parts = Vec::new();
        if !self.missing_from_listener.is_empty() {
            parts.push(format!(
                "listener does not declare: {:?}",
                self.missing_from_listener
            ));
        }
        if !self.unexpectedly_required.is_empty() {
            parts.push(format!(
                "listener requires (and nobody curries): {:?}",
                self.unexpectedly_required
            ));
        }
        if !self.bad_curried.is_empty() {
            parts.push(format!("improperly curried: {:?}", self.bad_curried));
        }
        parts.join("; ")
    }
}

/// Decides whether `info` (optionally with `curried` names fixed at
/// subscribe time) satisfies a topic whose MDS requires `required` and
/// allows `optional` (spec §4.E).
pub fn validate(
    required: &IndexSet<String>,
    optional: &IndexSet<String>,
    info: &CallArgsInfo,
    curried: &IndexSet<String>,
) -> std::result::Result<(), String> {
    let mut failure = ValidationFailure::default();
    let all_params = info.all_params();

    if !info.accepts_all_kwargs {
        for name in required.iter().chain(optional.iter()) {
            if !all_params.contains(name) {
                failure.missing_from_listener.push(name.clone());
            }
        }
        for name in &info.required_args {
            let supplied_by_sender = required.contains(name) || optional.contains(name);
            if !supplied_by_sender && !curried.contains(name) {
                failure.unexpectedly_required.push(name.clone());
            }
        }
    }

    for name in curried {
        if !all_params.contains(name) {
            failure.bad_curried.push(name.clone());
        } else if required.contains(name) || optional.contains(name) {
            failure.bad_curried.push(name.clone());
        }
    }

    if failure.is_empty() {
        Ok(())
    } else {
        Err(failure.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn validate_accepts_matching_signature() {
        let info = crate::callable::ListenerSpec::new()
            .required(["a", "b"])
            .optional(["c"])
            .build();
        assert!(validate(&set(&["a", "b"]), &set(&["c"]), &info, &set(&[])).is_ok());
    }

    #[test]
    fn validate_rejects_missing_listener_param() {
        let info = crate::callable::ListenerSpec::new().required(["a"]).build();
        let err = validate(&set(&["a", "b"]), &set(&[]), &info, &set(&[])).unwrap_err();
        assert!(err.contains('b'));
    }

    #[test]
    fn validate_allows_required_listener_param_when_curried() {
        let info = crate::callable::ListenerSpec::new().required(["a", "b"]).build();
        assert!(validate(&set(&["a"]), &set(&[]), &info, &set(&["b"])).is_ok());
    }

    #[test]
    fn validate_rejects_required_listener_param_without_currying() {
        let info = crate::callable::ListenerSpec::new().required(["a", "b"]).build();
        let err = validate(&set(&["a"]), &set(&[]), &info, &set(&[])).unwrap_err();
        assert!(err.contains("nobody curries"));
    }

    #[test]
    fn validate_rejects_curried_name_overlapping_topic_mds() {
        let info = crate::callable::ListenerSpec::new().required(["a"]).build();
        let err = validate(&set(&["a"]), &set(&[]), &info, &set(&["a"])).unwrap_err();
        assert!(err.contains("improperly curried"));
    }

    #[test]
    fn validate_all_kwargs_bypasses_rule_one() {
        let info = crate::callable::ListenerSpec::new()
            .accepts_all_kwargs(true)
            .build();
        assert!(validate(&set(&["a", "b"]), &set(&["c"]), &info, &set(&[])).is_ok());
    }
}

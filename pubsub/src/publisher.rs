//! The publisher facade (spec §4.I): the single entry point callers use to
//! subscribe, unsubscribe and send messages, plus the reentrant
//! `send_message` dispatch loop and exception-handling policy (spec §7).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexSet;
use pubsub_core::TopicName;

use crate::{
    argspec::ArgSpec,
    callable::{CallArgsInfo, ListenerSpec, PubsubListener},
    data::MsgData,
    error::{ListenerError, PubsubError, Result},
    listener::{CallOutcome, Listener, ListenerKey},
    manager::{ListenerHandle, TopicManager},
    notify::{FlagStateUpdate, NotificationFlags, NotificationHandler, SendStage},
    provider::TopicDefnProvider,
    topic::Topic,
};

thread_local! {
    static DEFAULT_MANAGER: Rc<RefCell<TopicManager>> = Rc::new(RefCell::new(TopicManager::new()));
}

/// The process-wide default topic tree, lazily created on first use (spec
/// §4.I: "a process has exactly one default tree unless an embedder opts
/// into a private one"). Not `Send`: like the teacher's message bus, this
/// broker is meant for single-threaded (or externally synchronized) use.
#[must_use]
pub fn default_topic_mgr() -> Rc<RefCell<TopicManager>> {
    DEFAULT_MANAGER.with(Rc::clone)
}

/// Handles a listener's error (or panic) when an exception handler has been
/// installed (spec §7). Returning `Ok(())` resumes dispatch with the next
/// listener; returning `Err` aborts dispatch, wrapped as
/// [`PubsubError::ExcHandler`].
pub trait ListenerExcHandler: Send + Sync {
    fn handle(&self, topic: &TopicName, listener_id: &str, error: &ListenerError) -> std::result::Result<(), ListenerError>;
}

#[derive(Debug)]
struct ListenerPanicked(String);

impl fmt::Display for ListenerPanicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener panicked: {}", self.0)
    }
}

impl std::error::Error for ListenerPanicked {}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// The broker facade. Cheaply `Clone`-able — every clone shares the same
/// underlying tree (spec §4.I), mirroring the teacher's handle-around-an-`Rc`
/// pattern for its message bus.
#[derive(Clone)]
pub struct Publisher {
    manager: Rc<RefCell<TopicManager>>,
    exc_handler: Rc<RefCell<Option<Arc<dyn ListenerExcHandler>>>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    /// A publisher backed by the process-wide default topic tree.
    #[must_use]
    pub fn new() -> Self {
        Self::with_manager(default_topic_mgr())
    }

    /// A publisher backed by its own, private topic tree.
    #[must_use]
    pub fn with_private_tree() -> Self {
        Self::with_manager(Rc::new(RefCell::new(TopicManager::new())))
    }

    #[must_use]
    pub fn with_manager(manager: Rc<RefCell<TopicManager>>) -> Self {
        Self {
            manager,
            exc_handler: Rc::new(RefCell::new(None)),
        }
    }

    // -- subscription management (spec §4.F) --------------------------------

    /// Subscribes `callable` to `topic`, declaring its signature via `spec`
    /// and fixing `curried` arguments at subscribe time. The caller retains
    /// ownership of `callable`'s `Arc`; the broker only ever keeps a `Weak`
    /// (spec §4.A).
    pub fn subscribe(
        &self,
        topic: &str,
        callable: &Arc<dyn PubsubListener>,
        spec: ListenerSpec,
        curried: MsgData,
    ) -> Result<(ListenerHandle, bool)> {
        let name = TopicName::tupleize(topic)?;
        self.manager.borrow_mut().subscribe(&name, callable, spec.build(), curried)
    }

    pub fn unsubscribe(&self, topic: &str, key: ListenerKey) -> Result<Option<ListenerHandle>> {
        let name = TopicName::tupleize(topic)?;
        self.manager.borrow_mut().unsubscribe(&name, key)
    }

    /// Removes every listener matching `listener_filter` (default: all), on
    /// `topic` (default: every topic) (spec §6 `unsubAll`).
    pub fn unsub_all(
        &self,
        topic: Option<&str>,
        listener_filter: Option<&dyn Fn(&Listener) -> bool>,
    ) -> Result<Vec<(TopicName, ListenerHandle)>> {
        let name = topic.map(TopicName::tupleize).transpose()?;
        Ok(self.manager.borrow_mut().unsub_all(name.as_ref(), listener_filter))
    }

    pub fn is_subscribed(&self, topic: &str, key: ListenerKey) -> Result<bool> {
        let name = TopicName::tupleize(topic)?;
        Ok(self.manager.borrow().is_subscribed(&name, key))
    }

    /// Whether `info` (with `curried` names fixed) would satisfy `topic`'s
    /// MDS (spec §6 `isValid`).
    pub fn is_valid(&self, topic: &str, info: &CallArgsInfo, curried: &IndexSet<String>) -> bool {
        self.validate(topic, info, curried).is_ok()
    }

    pub fn validate(&self, topic: &str, info: &CallArgsInfo, curried: &IndexSet<String>) -> Result<()> {
        let name = TopicName::tupleize(topic)?;
        self.manager.borrow().validate_signature(&name, info, curried)
    }

    // -- topic lifecycle (spec §4.G) -----------------------------------------

    /// Explicitly declares `topic`'s MDS, auto-creating ancestors as needed.
    pub fn declare_topic(&self, topic: &str, spec: ArgSpec) -> Result<()> {
        let name = TopicName::tupleize(topic)?;
        self.manager.borrow_mut().get_or_create_topic(&name, None, false, Some(spec))
    }

    pub fn del_topic(&self, topic: &str) -> Result<()> {
        let name = TopicName::tupleize(topic)?;
        self.manager.borrow_mut().del_topic(&name)
    }

    /// `getTopic` (spec §4.G): returns a snapshot of `topic`, or `None` if
    /// `ok_if_none` and it doesn't exist yet (otherwise `TopicNotFound`).
    pub fn get_topic(&self, topic: &str, ok_if_none: bool) -> Result<Option<Topic>> {
        let name = TopicName::tupleize(topic)?;
        Ok(self.manager.borrow().require(&name, ok_if_none)?.cloned())
    }

    pub fn clear_tree(&self) -> Result<()> {
        self.manager.borrow_mut().clear_tree()
    }

    pub fn check_all_topics_have_mds(&self) -> Result<()> {
        self.manager.borrow().check_all_topics_have_mds()
    }

    /// `setTopicUnspecifiedFatal` (spec §4.I). Returns the previous value.
    pub fn set_topic_unspecified_fatal(&self, new: bool, check_existing: bool) -> Result<bool> {
        self.manager.borrow_mut().set_topic_unspecified_fatal(new, check_existing)
    }

    // -- topic-definition providers (spec §4.H) ------------------------------

    pub fn add_defn_provider(&self, provider: Arc<dyn TopicDefnProvider>) {
        self.manager.borrow_mut().providers_mut().add(provider);
    }

    pub fn clear_defn_providers(&self) {
        self.manager.borrow_mut().providers_mut().clear();
    }

    /// Eagerly creates every topic named by a registered provider (spec §4.H
    /// `instantiateAllDefinedTopics`).
    pub fn instantiate_all_defined_topics(&self) -> Result<()> {
        let names = self.manager.borrow().providers().all_topic_names();
        for name in names {
            self.manager.borrow_mut().get_or_create_topic(&name, None, false, None)?;
        }
        Ok(())
    }

    /// A plain indented-text dump of the whole tree (spec §6
    /// `exportTopicTreeSpec`).
    #[must_use]
    pub fn export_topic_tree_spec(&self, module_doc: Option<&str>) -> String {
        self.manager.borrow().export_topic_tree_spec(module_doc)
    }

    // -- notifications (spec §4.J) -------------------------------------------

    pub fn add_notification_handler(&self, handler: Arc<dyn NotificationHandler>) {
        self.manager.borrow_mut().notify.add_handler(handler);
    }

    pub fn clear_notification_handlers(&self) {
        self.manager.borrow_mut().notify.clear_handlers();
    }

    #[must_use]
    pub fn notification_flags(&self) -> NotificationFlags {
        self.manager.borrow().notify.flags()
    }

    pub fn set_notification_flags(&self, update: FlagStateUpdate) {
        self.manager.borrow_mut().notify.set_flag_states(update);
    }

    // -- the listener exception handler (spec §7) ----------------------------

    pub fn set_listener_exc_handler(&self, handler: Option<Arc<dyn ListenerExcHandler>>) {
        *self.exc_handler.borrow_mut() = handler;
    }

    #[must_use]
    pub fn get_listener_exc_handler(&self) -> Option<Arc<dyn ListenerExcHandler>> {
        self.exc_handler.borrow().clone()
    }

    // -- sending (spec §4.F `sendMessage`) ------------------------------------

    /// Publishes `data` to `topic` and every ancestor that has listeners,
    /// root-to-leaf. Listeners may subscribe or unsubscribe (themselves or
    /// others) from within their own callback; dispatch iterates a snapshot
    /// of each topic's listener set taken just before invoking it, so such
    /// reentrant changes never invalidate the in-flight send (spec §4.F, §9
    /// Design Notes).
    ///
    /// An unhandled listener error (or panic) aborts the remaining dispatch
    /// and is returned as [`PubsubError::ListenerRaised`]. If a handler is
    /// installed via [`Self::set_listener_exc_handler`], it is invoked
    /// instead and dispatch resumes with the next listener, unless the
    /// handler itself errors, in which case the send aborts with
    /// [`PubsubError::ExcHandler`].
    pub fn send_message(&self, topic: &str, data: MsgData) -> Result<()> {
        let name = TopicName::tupleize(topic)?;
        self.manager
            .borrow_mut()
            .get_or_create_topic(&name, None, false, None)?;

        {
            let mgr = self.manager.borrow();
            let leaf = mgr.get(&name).expect("just created");
            if leaf.has_mds() {
                leaf.args_info.check(&name, &data)?;
            } else if mgr.raise_on_topic_unspecified() {
                return Err(PubsubError::TopicDefn(name.clone()));
            }
        }

        let mut chain: Vec<TopicName> = name.ancestors();
        chain.reverse();
        chain.push(name.clone());

        self.manager.borrow().notify.notify_send(SendStage::Pre, &name, None);
        let result = self.dispatch_chain(&chain, &data);
        self.manager.borrow().notify.notify_send(SendStage::Post, &name, None);
        result
    }

    fn dispatch_chain(&self, chain: &[TopicName], data: &MsgData) -> Result<()> {
        for t in chain {
            let (snapshot, filtered) = {
                let mgr = self.manager.borrow();
                let Some(topic) = mgr.get(t) else {
                    continue;
                };
                (topic.snapshot_listeners(), topic.args_info.filter(data))
            };
            for listener in snapshot {
                self.manager
                    .borrow()
                    .notify
                    .notify_send(SendStage::In, t, Some(listener.identity()));

                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    listener.call(&filtered, t, data)
                }));

                match outcome {
                    Ok(CallOutcome::Invoked) => {}
                    Ok(CallOutcome::Dead) => self.manager.borrow_mut().sweep_dead(t),
                    Ok(CallOutcome::Failed(err)) => self.handle_listener_error(t, listener.identity(), err)?,
                    Err(panicked) => {
                        let err: ListenerError = Box::new(ListenerPanicked(panic_message(panicked)));
                        self.handle_listener_error(t, listener.identity(), err)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_listener_error(&self, topic: &TopicName, listener_id: &str, error: ListenerError) -> Result<()> {
        let handler = self.exc_handler.borrow().clone();
        match handler {
            None => Err(PubsubError::ListenerRaised {
                topic: topic.clone(),
                listener: listener_id.to_owned(),
                source: error,
            }),
            Some(h) => match h.handle(topic, listener_id, &error) {
                Ok(()) => Ok(()),
                Err(handler_error) => Err(PubsubError::ExcHandler {
                    topic: topic.clone(),
                    listener: listener_id.to_owned(),
                    handler_error: handler_error.to_string(),
                    listener_error: error,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn spec(required: &[&str]) -> ListenerSpec {
        ListenerSpec::new().required(required.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn send_reaches_matching_listener() {
        let pub_ = Publisher::with_private_tree();
        let received: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let cb: Arc<dyn PubsubListener> = Arc::new(move |data: &MsgData, _t: &TopicName, _all: &MsgData| {
            let n = data.get("n").and_then(crate::data::MsgValue::as_i64).unwrap_or(0);
            received2.lock().expect("not poisoned").push(n);
            Ok(())
        });
        pub_.subscribe("a.b", &cb, spec(&["n"]), MsgData::new()).unwrap();
        pub_.send_message("a.b", MsgData::new().with("n", 42i64)).unwrap();
        assert_eq!(*received.lock().expect("not poisoned"), vec![42]);
    }

    #[test]
    fn ancestor_listener_receives_descendant_sends() {
        let pub_ = Publisher::with_private_tree();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let cb: Arc<dyn PubsubListener> = Arc::new(move |_d: &MsgData, _t: &TopicName, _all: &MsgData| {
            count2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        pub_.subscribe("a", &cb, ListenerSpec::new(), MsgData::new()).unwrap();
        pub_.send_message("a.b.c", MsgData::new()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscriber_is_swept_lazily_without_error() {
        let pub_ = Publisher::with_private_tree();
        let cb: Arc<dyn PubsubListener> = Arc::new(|_d: &MsgData, _t: &TopicName, _all: &MsgData| Ok(()));
        let (handle, _) = pub_.subscribe("a", &cb, ListenerSpec::new(), MsgData::new()).unwrap();
        drop(cb);
        pub_.send_message("a", MsgData::new()).unwrap();
        assert!(!pub_.is_subscribed("a", handle.key).unwrap());
    }

    #[test]
    fn unhandled_listener_error_aborts_and_propagates() {
        let pub_ = Publisher::with_private_tree();
        let cb: Arc<dyn PubsubListener> =
            Arc::new(|_d: &MsgData, _t: &TopicName, _all: &MsgData| Err("boom".into()));
        pub_.subscribe("a", &cb, ListenerSpec::new(), MsgData::new()).unwrap();
        let err = pub_.send_message("a", MsgData::new()).unwrap_err();
        assert!(matches!(err, PubsubError::ListenerRaised { .. }));
    }

    struct ResumingHandler {
        calls: AtomicUsize,
    }
    impl ListenerExcHandler for ResumingHandler {
        fn handle(&self, _topic: &TopicName, _listener_id: &str, _error: &ListenerError) -> std::result::Result<(), ListenerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn installed_handler_resumes_dispatch() {
        let pub_ = Publisher::with_private_tree();
        let handler = Arc::new(ResumingHandler { calls: AtomicUsize::new(0) });
        pub_.set_listener_exc_handler(Some(handler.clone()));

        let second_called = Arc::new(AtomicUsize::new(0));
        let second_called2 = second_called.clone();
        let failing: Arc<dyn PubsubListener> =
            Arc::new(|_d: &MsgData, _t: &TopicName, _all: &MsgData| Err("boom".into()));
        let ok: Arc<dyn PubsubListener> = Arc::new(move |_d: &MsgData, _t: &TopicName, _all: &MsgData| {
            second_called2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        pub_.subscribe("a", &failing, ListenerSpec::new(), MsgData::new()).unwrap();
        pub_.subscribe("a.b", &ok, ListenerSpec::new(), MsgData::new()).unwrap();

        pub_.send_message("a.b", MsgData::new()).unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_topic_returns_snapshot_and_none_or_error_when_missing() {
        let pub_ = Publisher::with_private_tree();
        let cb: Arc<dyn PubsubListener> = Arc::new(|_d: &MsgData, _t: &TopicName, _all: &MsgData| Ok(()));
        pub_.subscribe("a.b", &cb, spec(&["n"]), MsgData::new()).unwrap();

        let topic = pub_.get_topic("a.b", true).unwrap().expect("just subscribed");
        assert_eq!(topic.name.to_string(), "a.b");
        assert_eq!(topic.listener_count(), 1);

        assert!(pub_.get_topic("a.b.c", true).unwrap().is_none());
        assert!(pub_.get_topic("a.b.c", false).is_err());
    }

    #[test]
    fn reentrant_subscribe_during_dispatch_does_not_panic() {
        let pub_ = Publisher::with_private_tree();
        let inner_pub = pub_.clone();
        let late: Arc<dyn PubsubListener> = Arc::new(|_d: &MsgData, _t: &TopicName, _all: &MsgData| Ok(()));
        let late_for_closure = late.clone();
        let subscriber: Arc<dyn PubsubListener> = Arc::new(move |_d: &MsgData, _t: &TopicName, _all: &MsgData| {
            inner_pub
                .subscribe("a", &late_for_closure, ListenerSpec::new(), MsgData::new())
                .expect("reentrant subscribe must not panic");
            Ok(())
        });
        pub_.subscribe("a", &subscriber, ListenerSpec::new(), MsgData::new()).unwrap();
        pub_.send_message("a", MsgData::new()).unwrap();
    }
}

//! End-to-end coverage of the concrete scenarios from the design (curried
//! arguments, `AUTO_TOPIC` injection, dead-listener detection, cascading
//! topic deletion, and notification dispatch) that the unit tests scattered
//! through `pubsub/src` don't already exercise as a whole broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pubsub::{
    FlagStateUpdate, ListenerSpec, MsgData, NotificationHandler, Publisher, PubsubError,
    PubsubListener, SendStage, TopicName,
};

fn recording_listener() -> (Arc<dyn PubsubListener>, Arc<Mutex<Vec<MsgData>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let listener: Arc<dyn PubsubListener> = Arc::new(move |data: &MsgData, _topic: &TopicName, _all: &MsgData| {
        seen2.lock().expect("not poisoned").push(data.clone());
        Ok(())
    });
    (listener, seen)
}

#[test]
fn curried_arg_is_merged_and_resubscribe_updates_its_value() {
    let broker = Publisher::with_private_tree();
    let (listener, seen) = recording_listener();

    broker
        .subscribe(
            "z",
            &listener,
            ListenerSpec::new().required(["a", "b", "c"]),
            MsgData::new().with("b", 99i64),
        )
        .unwrap();
    broker
        .send_message("z", MsgData::new().with("a", 5i64).with("c", 7i64))
        .unwrap();

    {
        let calls = seen.lock().expect("not poisoned");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get("a").unwrap().as_i64(), Some(5));
        assert_eq!(calls[0].get("b").unwrap().as_i64(), Some(99));
        assert_eq!(calls[0].get("c").unwrap().as_i64(), Some(7));
    }

    // Re-subscribing the same callable with the same curried key set updates
    // the value and leaves the listener count unchanged.
    let (_, was_new) = broker
        .subscribe(
            "z",
            &listener,
            ListenerSpec::new().required(["a", "b", "c"]),
            MsgData::new().with("b", 100i64),
        )
        .unwrap();
    assert!(!was_new);

    broker
        .send_message("z", MsgData::new().with("a", 1i64).with("c", 1i64))
        .unwrap();
    let calls = seen.lock().expect("not poisoned");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].get("b").unwrap().as_i64(), Some(100));
}

#[test]
fn resubscribe_with_a_different_curried_key_set_is_rejected() {
    let broker = Publisher::with_private_tree();
    let (listener, _seen) = recording_listener();

    broker
        .subscribe(
            "z",
            &listener,
            ListenerSpec::new().required(["a", "b", "d"]),
            MsgData::new().with("b", 99i64),
        )
        .unwrap();

    let err = broker
        .subscribe(
            "z",
            &listener,
            ListenerSpec::new().required(["a", "b", "d"]),
            MsgData::new().with("b", 100i64).with("d", 0i64),
        )
        .unwrap_err();
    assert!(matches!(err, PubsubError::CurriedArgMismatch(_)));
}

#[test]
fn auto_topic_parameter_receives_the_delivering_topic() {
    let broker = Publisher::with_private_tree();
    let captured: Arc<Mutex<Option<TopicName>>> = Arc::new(Mutex::new(None));
    let captured2 = captured.clone();
    let listener: Arc<dyn PubsubListener> = Arc::new(move |data: &MsgData, _topic: &TopicName, _all: &MsgData| {
        let name = data.get("topic").and_then(|v| v.downcast_ref::<TopicName>()).cloned();
        *captured2.lock().expect("not poisoned") = name;
        Ok(())
    });

    broker
        .subscribe(
            "a.b",
            &listener,
            ListenerSpec::new().required(["arg"]).auto_topic_arg("topic"),
            MsgData::new(),
        )
        .unwrap();
    broker.send_message("a.b", MsgData::new().with("arg", 42i64)).unwrap();

    let got = captured.lock().expect("not poisoned").clone().unwrap();
    assert_eq!(got.stringize(), "a.b");
}

#[test]
fn dead_listener_is_swept_and_notified_on_next_send() {
    let broker = Publisher::with_private_tree();
    broker.set_notification_flags(FlagStateUpdate {
        dead_listener: Some(true),
        ..Default::default()
    });

    #[derive(Default)]
    struct DeathCounter {
        count: AtomicUsize,
    }
    impl NotificationHandler for DeathCounter {
        fn notify_dead_listener(&self, _listener_id: &str, _topic: &TopicName) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
    let counter = Arc::new(DeathCounter::default());
    broker.add_notification_handler(counter.clone());

    let listener: Arc<dyn PubsubListener> = Arc::new(|_d: &MsgData, _t: &TopicName, _a: &MsgData| Ok(()));
    let (handle, _) = broker.subscribe("a", &listener, ListenerSpec::new(), MsgData::new()).unwrap();
    drop(listener);

    broker.send_message("a", MsgData::new()).unwrap();

    assert_eq!(counter.count.load(Ordering::SeqCst), 1);
    assert!(!broker.is_subscribed("a", handle.key).unwrap());
}

#[test]
fn deleting_a_topic_cascades_to_descendants_and_unsubscribes_every_listener() {
    let broker = Publisher::with_private_tree();
    let (l1, _) = recording_listener();
    let (l2, _) = recording_listener();
    broker.subscribe("p", &l1, ListenerSpec::new(), MsgData::new()).unwrap();
    broker.subscribe("p.c", &l2, ListenerSpec::new(), MsgData::new()).unwrap();

    broker.del_topic("p").unwrap();

    // The subtree is gone: sending to it auto-recreates bare topics rather
    // than reaching the old listeners.
    broker.send_message("p.c", MsgData::new()).unwrap();
    assert!(!broker.is_subscribed("p", pubsub::ListenerKey::of(&l1)).unwrap());
    assert!(!broker.is_subscribed("p.c", pubsub::ListenerKey::of(&l2)).unwrap());
}

#[test]
fn unsub_all_removes_every_matching_listener_across_topics() {
    let broker = Publisher::with_private_tree();
    let (l1, _) = recording_listener();
    let (l2, _) = recording_listener();
    broker.subscribe("a", &l1, ListenerSpec::new(), MsgData::new()).unwrap();
    broker.subscribe("b", &l2, ListenerSpec::new(), MsgData::new()).unwrap();

    let removed = broker.unsub_all(None, None).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(!broker.is_subscribed("a", pubsub::ListenerKey::of(&l1)).unwrap());
    assert!(!broker.is_subscribed("b", pubsub::ListenerKey::of(&l2)).unwrap());
}

#[test]
fn send_to_topic_with_no_subscribers_still_fires_pre_and_post_notifications() {
    let broker = Publisher::with_private_tree();
    broker.set_notification_flags(FlagStateUpdate {
        send_message: Some(true),
        ..Default::default()
    });

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<SendStage>>,
    }
    impl NotificationHandler for StageRecorder {
        fn notify_send(&self, stage: SendStage, _topic: &TopicName, _listener_id: Option<&str>) {
            self.stages.lock().expect("not poisoned").push(stage);
        }
    }
    let recorder = Arc::new(StageRecorder::default());
    broker.add_notification_handler(recorder.clone());

    broker.send_message("nobody.home", MsgData::new()).unwrap();

    let stages = recorder.stages.lock().expect("not poisoned");
    assert_eq!(stages.as_slice(), [SendStage::Pre, SendStage::Post]);
}

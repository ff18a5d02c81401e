//! An in-process publish/subscribe broker: publishers send named messages
//! through a hierarchical topic tree to listeners subscribed anywhere along
//! that tree's root-to-leaf path, validated against each topic's declared
//! Message Data Specification.
//!
//! ```
//! use std::sync::Arc;
//!
//! use pubsub::{CallArgsInfo, ListenerSpec, MsgData, Publisher, PubsubListener, TopicName};
//!
//! let broker = Publisher::with_private_tree();
//! let listener: Arc<dyn PubsubListener> = Arc::new(|data: &MsgData, _topic: &TopicName, _all: &MsgData| {
//!     let _ = data.get("amount");
//!     Ok(())
//! });
//! broker
//!     .subscribe("orders.created", &listener, ListenerSpec::new().required(["amount"]), MsgData::new())
//!     .unwrap();
//! broker
//!     .send_message("orders.created", MsgData::new().with("amount", 100i64))
//!     .unwrap();
//! ```

pub mod argspec;
pub mod callable;
pub mod data;
pub mod error;
pub mod listener;
pub mod manager;
pub mod notify;
pub mod provider;
pub mod publisher;
pub mod topic;
pub mod traverse;

pub use argspec::{ArgSpec, ArgsInfo, MdsState};
pub use callable::{CallArgsInfo, ListenerSpec, PubsubListener};
pub use data::{MsgData, MsgValue};
pub use error::{ListenerError, PubsubError, Result};
pub use listener::{CallOutcome, Listener, ListenerKey};
pub use manager::{ListenerHandle, TopicManager};
pub use notify::{FlagStateUpdate, NotificationFlags, NotificationHandler, SendStage};
pub use provider::{ProviderRegistry, TopicDefnProvider};
pub use publisher::{default_topic_mgr, ListenerExcHandler, Publisher};
pub use topic::Topic;
pub use traverse::{traverse, TopicTreeVisitor, TraversalOrder};

pub use pubsub_core::{TopicName, TopicNameError, ALL_TOPICS_NAME};

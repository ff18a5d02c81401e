//! The error taxonomy surfaced to callers of the broker (spec §7): one
//! `thiserror` variant per distinct kind, so callers can discriminate with
//! `matches!`/`if let` rather than string-matching messages.

use pubsub_core::TopicName;
use thiserror::Error;

pub use pubsub_core::TopicNameError;

/// The error a listener call returns. Listeners own their error type and
/// box it; the broker never needs to know more than `Display`/`Error`.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PubsubError {
    /// Malformed topic name (spec §4.L).
    #[error(transparent)]
    TopicName(#[from] TopicNameError),

    /// The topic has no definition and `topic-unspecified-fatal` mode is on.
    #[error("topic '{0}' requires a message data specification but none was given")]
    TopicDefn(TopicName),

    /// Requested topic is not known to the manager.
    #[error("topic '{0}' not found")]
    TopicNotFound(TopicName),

    /// A callable's declared signature does not satisfy a topic's MDS.
    #[error("listener mismatch on topic '{topic}': {message}")]
    ListenerMismatch { topic: TopicName, message: String },

    /// A topic's given MDS violates the parent/child composition invariants.
    #[error("message data specification error on topic '{topic}': {message}")]
    MessageDataSpec { topic: TopicName, message: String },

    /// A sender omitted one or more of a topic's required message-data keys.
    #[error(
        "topic '{topic}' is missing required message data: missing {missing:?}, given {given:?}"
    )]
    SenderMissingReqdMsgData {
        topic: TopicName,
        given: Vec<String>,
        missing: Vec<String>,
    },

    /// A sender supplied message-data keys the topic's MDS does not recognize.
    #[error(
        "topic '{topic}' was sent unknown message data: unknown {unknown:?}, given {given:?}"
    )]
    SenderUnknownMsgData {
        topic: TopicName,
        given: Vec<String>,
        unknown: Vec<String>,
    },

    /// `Listener::set_curried_args` was called with a different key set than
    /// the one already registered.
    #[error("curried argument key set must match the existing registration: {0}")]
    CurriedArgMismatch(String),

    /// The installed exception handler itself raised while handling a
    /// listener error.
    #[error(
        "exception handler for topic '{topic}' raised while handling listener '{listener}': {handler_error}"
    )]
    ExcHandler {
        topic: TopicName,
        listener: String,
        handler_error: String,
        #[source]
        listener_error: ListenerError,
    },

    /// A listener raised (or panicked) and no exception handler was installed:
    /// the send aborts and this propagates out of `send_message`.
    #[error("listener '{listener}' on topic '{topic}' raised an error")]
    ListenerRaised {
        topic: TopicName,
        listener: String,
        #[source]
        source: ListenerError,
    },
}

pub type Result<T> = std::result::Result<T, PubsubError>;

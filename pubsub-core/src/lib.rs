//! Foundational identifiers shared by the `pubsub` broker crate.
//!
//! This crate is deliberately small and dependency-free (beyond `ustr` and
//! `thiserror`): it owns topic-name parsing/validation and the name of the
//! reserved tree root, so that both the broker crate and any downstream
//! embedder can refer to topic names without depending on the whole broker.

pub mod error;
pub mod name;

pub use error::TopicNameError;
pub use name::{TopicName, ALL_TOPICS_NAME};

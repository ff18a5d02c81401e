use thiserror::Error;

/// Errors raised while parsing or validating a topic name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicNameError {
    /// The name (or one of its dotted components) is the empty string.
    #[error("topic name must not be empty")]
    Empty,
    /// A component contains characters other than `[A-Za-z0-9_]`, or starts
    /// with a digit.
    #[error("invalid topic name component '{0}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidComponent(String),
    /// A component equals the reserved root name `ALL_TOPICS` outside of the
    /// root position.
    #[error("'{0}' is reserved for the root topic and cannot appear elsewhere in a topic name")]
    ReservedRootName(String),
}

//! Topic name tuples: parsing, validation and round-tripping between the
//! dot-joined external form (`"a.b.c"`) and the internal tuple form.

use std::fmt;

use ustr::Ustr;

use crate::error::TopicNameError;

/// The reserved name of the tree root. No user topic may use this name
/// outside of the root position.
pub const ALL_TOPICS_NAME: &str = "ALL_TOPICS";

/// A topic name: an ordered, non-empty sequence of identifier components,
/// representing the path from the root (exclusive of `ALL_TOPICS` itself,
/// except when this *is* the root).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicName(Vec<Ustr>);

impl TopicName {
    /// The name of the implicit tree root.
    #[must_use]
    pub fn root() -> Self {
        Self(vec![Ustr::from(ALL_TOPICS_NAME)])
    }

    /// Builds a topic name from already-split components, validating them.
    pub fn from_parts<I, S>(parts: I) -> Result<Self, TopicNameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<Ustr> = parts.into_iter().map(|s| Ustr::from(s.as_ref())).collect();
        validate(&parts)?;
        Ok(Self(parts))
    }

    /// Parses the dot-joined external form of a topic name (`tupleize`).
    pub fn tupleize(s: &str) -> Result<Self, TopicNameError> {
        Self::from_parts(s.split('.'))
    }

    /// Returns the dot-joined external form of this name (`stringize`).
    #[must_use]
    pub fn stringize(&self) -> String {
        self.0
            .iter()
            .map(Ustr::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The path components, root-to-leaf.
    #[must_use]
    pub fn parts(&self) -> &[Ustr] {
        &self.0
    }

    /// The final (leaf) component.
    #[must_use]
    pub fn leaf(&self) -> Ustr {
        // A TopicName is never empty: construction always validates a
        // non-empty component list.
        self.0[self.0.len() - 1]
    }

    /// True iff this is the tree root (`ALL_TOPICS`).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1 && self.0[0].as_str() == ALL_TOPICS_NAME
    }

    /// The name of the parent topic, or `None` if this is the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else if self.0.len() == 1 {
            Some(Self::root())
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Builds the name of a direct child with the given leaf component.
    pub fn child(&self, leaf: &str) -> Result<Self, TopicNameError> {
        let leaf = Ustr::from(leaf);
        validate_component(&leaf, false)?;
        let mut parts = if self.is_root() {
            Vec::new()
        } else {
            self.0.clone()
        };
        parts.push(leaf);
        Ok(Self(parts))
    }

    /// All ancestors, from this topic's immediate parent up to (and
    /// including) the root, in that order.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(name) = cur {
            let next = name.parent();
            out.push(name);
            cur = next;
        }
        out
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringize())
    }
}

fn validate(parts: &[Ustr]) -> Result<(), TopicNameError> {
    if parts.is_empty() {
        return Err(TopicNameError::Empty);
    }
    let is_root_form = parts.len() == 1 && parts[0].as_str() == ALL_TOPICS_NAME;
    for part in parts {
        validate_component(part, is_root_form)?;
    }
    Ok(())
}

fn validate_component(part: &Ustr, is_root_form: bool) -> Result<(), TopicNameError> {
    let s = part.as_str();
    if s.is_empty() {
        return Err(TopicNameError::Empty);
    }
    if s == ALL_TOPICS_NAME {
        if is_root_form {
            return Ok(());
        }
        return Err(TopicNameError::ReservedRootName(s.to_owned()));
    }
    let mut chars = s.chars();
    let first = chars.next().expect("non-empty checked above");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(TopicNameError::InvalidComponent(s.to_owned()));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TopicNameError::InvalidComponent(s.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("a.b.c")]
    #[case("topic")]
    #[case("a_1.b2.c_3")]
    fn tupleize_stringize_round_trip(#[case] s: &str) {
        let name = TopicName::tupleize(s).unwrap();
        assert_eq!(name.stringize(), s);
    }

    #[rstest]
    #[case("")]
    #[case("a..b")]
    #[case("1abc")]
    #[case("a.b-c")]
    #[case("a.ALL_TOPICS")]
    #[case("ALL_TOPICS.a")]
    fn rejects_invalid_names(#[case] s: &str) {
        assert!(TopicName::tupleize(s).is_err());
    }

    #[test]
    fn root_accepts_all_topics() {
        let root = TopicName::tupleize("ALL_TOPICS").unwrap();
        assert!(root.is_root());
        assert_eq!(root, TopicName::root());
    }

    #[test]
    fn parent_and_ancestors() {
        let leaf = TopicName::tupleize("a.b.c").unwrap();
        assert_eq!(leaf.parent().unwrap().stringize(), "a.b");
        let ancestors: Vec<String> = leaf.ancestors().iter().map(TopicName::stringize).collect();
        assert_eq!(ancestors, vec!["a.b", "a", "ALL_TOPICS"]);
    }

    #[test]
    fn child_of_root_has_no_all_topics_prefix() {
        let root = TopicName::root();
        let child = root.child("a").unwrap();
        assert_eq!(child.stringize(), "a");
    }
}

//! The Message Data Specification (MDS) algebra (spec §3, §4.C): a topic's
//! required/optional parameter names, composed parent-to-child, and the
//! sender-data validation that uses it.

use indexmap::{IndexMap, IndexSet};
use pubsub_core::TopicName;

use crate::error::{PubsubError, Result};
use crate::data::MsgData;

/// A caller-supplied MDS, prior to being reconciled against a parent. This
/// is what a provider, a derived-from-listener signature, or an explicit
/// declaration hands to [`ArgsInfo::finalize`].
#[derive(Clone, Debug, Default)]
pub struct ArgSpec {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub docs: IndexMap<String, String>,
}

impl ArgSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_optional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_doc(mut self, name: impl Into<String>, doc: impl Into<String>) -> Self {
        self.docs.insert(name.into(), doc.into());
        self
    }

    /// Fills in a placeholder doc string for every required/optional name
    /// that doesn't already have one (spec §4.F step 2: "derived MDS uses
    /// the listener's required and optional sets, with placeholder docs").
    pub fn fill_placeholder_docs(&mut self) {
        for name in self.required.iter().chain(self.optional.iter()) {
            self.docs
                .entry(name.clone())
                .or_insert_with(|| "UNDOCUMENTED".to_owned());
        }
    }
}

/// Whether a topic's MDS has been finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MdsState {
    Incomplete,
    Complete,
}

impl Default for MdsState {
    fn default() -> Self {
        Self::Incomplete
    }
}

/// A topic's Message Data Specification. Parent/child reconciliation is
/// driven externally by [`finalize`] being given the nearest COMPLETE
/// ancestor's `ArgsInfo` — there is no owned parent pointer here, following
/// the arena-by-name approach spec §9's Design Notes recommend to avoid
/// ownership cycles between topics.
#[derive(Clone, Debug, Default)]
pub struct ArgsInfo {
    pub required: IndexSet<String>,
    pub optional: IndexSet<String>,
    pub docs: IndexMap<String, String>,
    pub state: MdsState,
    pub added_to_parent: IndexSet<String>,
}

impl ArgsInfo {
    /// An MDS-less topic: every subsequent `check`/`filter` accepts nothing
    /// until `finalize` is called.
    #[must_use]
    pub fn incomplete() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == MdsState::Complete
    }

    /// `required ∪ optional` (spec §4.C `allArgs`).
    #[must_use]
    pub fn all_args(&self) -> IndexSet<String> {
        self.required.union(&self.optional).cloned().collect()
    }

    /// Transitions an INCOMPLETE (or already-complete, being re-finalized)
    /// MDS to COMPLETE against `given`, reconciling with the nearest
    /// COMPLETE ancestor `parent` if one exists (spec §4.C Finalize,
    /// invariants 1-3).
    pub fn finalize(&mut self, given: &ArgSpec, topic: &TopicName, parent: Option<&Self>) -> Result<()> {
        let required: IndexSet<String> = given.required.iter().cloned().collect();
        let optional: IndexSet<String> = given.optional.iter().cloned().collect();

        let overlap: Vec<&String> = required.intersection(&optional).collect();
        if !overlap.is_empty() {
            return Err(PubsubError::MessageDataSpec {
                topic: topic.clone(),
                message: format!(
                    "parameters cannot be both required and optional: {overlap:?}"
                ),
            });
        }
        let all: IndexSet<String> = required.union(&optional).cloned().collect();
        let undocumented: Vec<&String> = all
            .iter()
            .filter(|n| !given.docs.contains_key(n.as_str()))
            .collect();
        if !undocumented.is_empty() {
            return Err(PubsubError::MessageDataSpec {
                topic: topic.clone(),
                message: format!("missing documentation for parameters: {undocumented:?}"),
            });
        }

        if let Some(parent) = parent {
            let missing_required: Vec<&String> =
                parent.required.difference(&required).collect();
            if !missing_required.is_empty() {
                return Err(PubsubError::MessageDataSpec {
                    topic: topic.clone(),
                    message: format!(
                        "must keep all parent-required parameters required: missing {missing_required:?}"
                    ),
                });
            }
            let parent_all = parent.all_args();
            let missing_from_all: Vec<&String> = parent_all.difference(&all).collect();
            if !missing_from_all.is_empty() {
                return Err(PubsubError::MessageDataSpec {
                    topic: topic.clone(),
                    message: format!(
                        "must carry every parent parameter: missing {missing_from_all:?}"
                    ),
                });
            }
            let demoted: Vec<&String> = parent.required.intersection(&optional).collect();
            if !demoted.is_empty() {
                return Err(PubsubError::MessageDataSpec {
                    topic: topic.clone(),
                    message: format!(
                        "parameters required by an ancestor cannot become optional here: {demoted:?}"
                    ),
                });
            }
        }

        self.added_to_parent = match parent {
            Some(parent) => all.difference(&parent.all_args()).cloned().collect(),
            None => all.clone(),
        };
        self.required = required;
        self.optional = optional;
        self.docs = given.docs.clone();
        self.state = MdsState::Complete;
        Ok(())
    }

    /// Validates a sender's payload against this MDS (spec §4.C `check`).
    pub fn check(&self, topic: &TopicName, data: &MsgData) -> Result<()> {
        let given = data.key_set();
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|n| !given.contains(n.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PubsubError::SenderMissingReqdMsgData {
                topic: topic.clone(),
                given: given.into_iter().collect(),
                missing,
            });
        }
        let all = self.all_args();
        let unknown: Vec<String> = given
            .iter()
            .filter(|k| !all.contains(k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PubsubError::SenderUnknownMsgData {
                topic: topic.clone(),
                given: given.into_iter().collect(),
                unknown,
            });
        }
        Ok(())
    }

    /// Projects `data` down to the keys this MDS recognizes (spec §4.C
    /// `filter`). Precondition: `check` has already succeeded for this topic
    /// or a descendant.
    #[must_use]
    pub fn filter(&self, data: &MsgData) -> MsgData {
        data.filter_keys(&self.all_args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(s: &str) -> TopicName {
        TopicName::tupleize(s).unwrap()
    }

    fn spec(required: &[&str], optional: &[&str]) -> ArgSpec {
        let mut s = ArgSpec::new()
            .with_required(required.iter().copied())
            .with_optional(optional.iter().copied());
        s.fill_placeholder_docs();
        s
    }

    #[test]
    fn finalize_root_without_parent() {
        let mut info = ArgsInfo::incomplete();
        info.finalize(&spec(&["a", "b"], &["c"]), &topic("t"), None)
            .unwrap();
        assert!(info.is_complete());
        assert_eq!(info.added_to_parent, info.all_args());
    }

    #[test]
    fn finalize_rejects_overlap_between_required_and_optional() {
        let mut info = ArgsInfo::incomplete();
        let err = info
            .finalize(&spec(&["a"], &["a"]), &topic("t"), None)
            .unwrap_err();
        assert!(matches!(err, PubsubError::MessageDataSpec { .. }));
    }

    #[test]
    fn finalize_rejects_dropping_a_parent_required_param() {
        let mut parent = ArgsInfo::incomplete();
        parent
            .finalize(&spec(&["x", "y"], &[]), &topic("p"), None)
            .unwrap();

        let mut child = ArgsInfo::incomplete();
        let err = child
            .finalize(&spec(&["x"], &[]), &topic("p.c"), Some(&parent))
            .unwrap_err();
        assert!(matches!(err, PubsubError::MessageDataSpec { .. }));
    }

    #[test]
    fn finalize_rejects_demoting_required_to_optional() {
        let mut parent = ArgsInfo::incomplete();
        parent
            .finalize(&spec(&["x"], &[]), &topic("p"), None)
            .unwrap();

        let mut child = ArgsInfo::incomplete();
        let err = child
            .finalize(&spec(&[], &["x"]), &topic("p.c"), Some(&parent))
            .unwrap_err();
        assert!(matches!(err, PubsubError::MessageDataSpec { .. }));
    }

    #[test]
    fn finalize_allows_optional_becoming_required() {
        let mut parent = ArgsInfo::incomplete();
        parent
            .finalize(&spec(&[], &["y"]), &topic("p"), None)
            .unwrap();

        let mut child = ArgsInfo::incomplete();
        child
            .finalize(&spec(&["y"], &[]), &topic("p.c"), Some(&parent))
            .unwrap();
        assert!(child.required.contains("y"));
    }

    #[test]
    fn check_reports_missing_and_unknown() {
        let mut info = ArgsInfo::incomplete();
        info.finalize(&spec(&["a"], &["b"]), &topic("t"), None)
            .unwrap();

        let ok = MsgData::new().with("a", 1i64).with("b", 2i64);
        info.check(&topic("t"), &ok).unwrap();

        let missing = MsgData::new().with("b", 2i64);
        assert!(matches!(
            info.check(&topic("t"), &missing),
            Err(PubsubError::SenderMissingReqdMsgData { .. })
        ));

        let unknown = MsgData::new().with("a", 1i64).with("z", 9i64);
        assert!(matches!(
            info.check(&topic("t"), &unknown),
            Err(PubsubError::SenderUnknownMsgData { .. })
        ));
    }

    #[test]
    fn filter_keeps_only_mds_keys() {
        let mut info = ArgsInfo::incomplete();
        info.finalize(&spec(&["a"], &[]), &topic("t"), None).unwrap();
        let data = MsgData::new().with("a", 1i64).with("extra", 2i64);
        let filtered = info.filter(&data);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.get("extra").is_none());
    }
}

//! The payload carried by a message: an ordered map from parameter name to
//! value, plus a small value type wide enough for both plain scalars and
//! arbitrary sender-owned data (including, notably, a [`TopicName`] injected
//! for the `AUTO_TOPIC` redesign — see [`crate::callable::ListenerSpec`]).

use std::{any::Any, fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};

/// A single value carried under a message-data key.
#[derive(Clone)]
pub enum MsgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Opaque, sender-owned data of any type.
    Any(Arc<dyn Any + Send + Sync>),
}

impl MsgValue {
    /// Attempts to downcast an `Any` value to `T`. Scalar variants never
    /// downcast successfully through this path; use the `as_*` accessors
    /// for those.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Any(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for MsgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b:?}"),
            Self::Int(i) => write!(f, "{i:?}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Any(_) => write!(f, "<any>"),
        }
    }
}

macro_rules! impl_from_scalar {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for MsgValue {
            fn from(v: $ty) -> Self {
                Self::$variant(v.into())
            }
        }
    };
}

impl_from_scalar!(bool, Bool);
impl_from_scalar!(i64, Int);
impl_from_scalar!(i32, Int);
impl_from_scalar!(f64, Float);
impl_from_scalar!(String, Str);

impl From<&str> for MsgValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

/// The keyword-argument map a sender publishes, or a listener receives: an
/// insertion-ordered map from parameter name to [`MsgValue`].
#[derive(Clone, Debug, Default)]
pub struct MsgData(IndexMap<String, MsgValue>);

impl MsgData {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MsgValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert, for constructing literals inline.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MsgValue>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MsgValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn key_set(&self) -> IndexSet<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MsgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new map containing only the keys present in `allowed`.
    #[must_use]
    pub fn filter_keys(&self, allowed: &IndexSet<String>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| allowed.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Merges `other` on top of `self`: keys in `other` win on collision.
    pub fn merge_over(&mut self, other: &Self) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl FromIterator<(String, MsgValue)> for MsgData {
    fn from_iter<I: IntoIterator<Item = (String, MsgValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

//! Registry of native (builtin) functions, supplied by the embedding host.

use serde::{Deserialize, Serialize};

use crate::image::NativeId;

/// Maps a native function id to its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeRegistry {
    names: Vec<String>,
}

impl NativeRegistry {
    /// Build a registry where `names[i]` is the builtin with id `i`.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn name(&self, id: NativeId) -> Option<&str> {
        self.names.get(id.slot()?).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NativeRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

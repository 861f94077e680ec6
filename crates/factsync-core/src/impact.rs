//! Impacted artifacts and the target columns to recompute

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Serialized form of [`TargetColumn::FullRebuild`]
///
/// Angle brackets cannot appear in an unquoted warehouse identifier.
pub const FULL_REBUILD_MARKER: &str = "<full-rebuild>";

/// A target column of an artifact, or the whole artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetColumn {
    /// The artifact needs a full rebuild, not a column-targeted one
    FullRebuild,

    /// A named column of the artifact
    Column(String),
}

impl TargetColumn {
    /// Create a named target column
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// True for the full-rebuild sentinel
    pub fn is_full_rebuild(&self) -> bool {
        matches!(self, Self::FullRebuild)
    }
}

impl std::fmt::Display for TargetColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullRebuild => write!(f, "{}", FULL_REBUILD_MARKER),
            Self::Column(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for TargetColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetColumn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == FULL_REBUILD_MARKER {
            Ok(Self::FullRebuild)
        } else {
            Ok(Self::Column(raw))
        }
    }
}

/// Artifact name → affected target columns
///
/// An artifact is present only if something mapped to it; the column sets
/// are deduplicated and ordered, so two maps built from the same changes in
/// a different order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpactMap {
    artifacts: BTreeMap<String, BTreeSet<TargetColumn>>,
}

impl ImpactMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one target column of an artifact as affected
    pub fn insert(&mut self, artifact: impl Into<String>, target: TargetColumn) {
        self.artifacts.entry(artifact.into()).or_default().insert(target);
    }

    /// Union another map into this one
    pub fn merge(&mut self, other: ImpactMap) {
        for (artifact, targets) in other.artifacts {
            self.artifacts.entry(artifact).or_default().extend(targets);
        }
    }

    /// Artifact names in sorted order
    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// Target columns for an artifact
    pub fn targets(&self, artifact: &str) -> Option<&BTreeSet<TargetColumn>> {
        self.artifacts.get(artifact)
    }

    /// Iterate over (artifact, targets)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<TargetColumn>)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True if an artifact is impacted
    pub fn contains(&self, artifact: &str) -> bool {
        self.artifacts.contains_key(artifact)
    }

    /// Number of impacted artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True when nothing is impacted
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

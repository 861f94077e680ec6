//! Impact resolution: changed source columns → artifacts and target columns
//!
//! Resolution is a pure function of the table and its changed columns, so
//! accumulating per-record maps by union gives the same result in any order.

use factsync_core::{ChangeSet, ChangeType, DetectionMode, ImpactDictionary, ImpactMap, TargetColumn};

/// Maps changed columns through the impact dictionary
#[derive(Clone, Copy)]
pub struct ImpactResolver<'a> {
    dictionary: &'a ImpactDictionary,
}

impl<'a> ImpactResolver<'a> {
    pub fn new(dictionary: &'a ImpactDictionary) -> Self {
        Self { dictionary }
    }

    /// Affected target columns per artifact
    ///
    /// Columns without a dictionary entry are ignored.
    pub fn resolve<S: AsRef<str>>(&self, table: &str, changed_columns: &[S]) -> ImpactMap {
        let mut impact = ImpactMap::new();

        for column in changed_columns {
            let Some(mapping) = self.dictionary.mapping(table, column.as_ref()) else {
                continue;
            };

            for (artifact, spec) in mapping {
                for target in spec.targets() {
                    impact.insert(artifact.as_str(), TargetColumn::column(target));
                }
            }
        }

        impact
    }

    /// Every artifact fed by the table, marked for a full rebuild
    pub fn resolve_full_rebuild(&self, table: &str) -> ImpactMap {
        let mut impact = ImpactMap::new();
        for artifact in self.dictionary.artifacts_for_table(table) {
            impact.insert(artifact, TargetColumn::FullRebuild);
        }
        impact
    }

    /// Impact of one analyzed record under the given detection mode
    ///
    /// Without per-column diffs a new record cannot be narrowed to target
    /// columns, so every artifact of its table gets a full rebuild.
    pub fn resolve_change_set(&self, change_set: &ChangeSet, mode: DetectionMode) -> ImpactMap {
        match (mode, change_set.change_type) {
            (DetectionMode::DictionaryAssumedColumns, ChangeType::Insert) => {
                self.resolve_full_rebuild(&change_set.source_table)
            }
            _ => self.resolve(&change_set.source_table, &change_set.changed_columns),
        }
    }
}

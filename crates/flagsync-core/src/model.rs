//! Configuration snapshot model
//!
//! The immutable data model produced by a successful fetch+verify+parse
//! cycle. A `Configuration` is only ever replaced wholesale, never mutated,
//! so the evaluation side can hold cheap `Arc` clones of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named rule bundle mapping a boolean condition to governed flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique identifier within a configuration
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Serialized boolean expression, opaque to this subsystem
    pub condition: String,
    /// Whether the experiment is archived
    pub archived: bool,
    /// Names of the feature flags governed by this experiment
    pub flags: Vec<String>,
    /// Tag set
    pub labels: BTreeSet<String>,
    /// Property used for consistent bucketing
    pub stickiness_property: Option<String>,
}

impl Experiment {
    /// Create an experiment with no flags, labels or stickiness override
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition: condition.into(),
            archived: false,
            flags: Vec::new(),
            labels: BTreeSet::new(),
            stickiness_property: None,
        }
    }

    /// With governed flag names
    #[must_use]
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    /// With label set
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeSet<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Mark as archived
    #[must_use]
    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }

    /// With stickiness property
    #[must_use]
    pub fn with_stickiness_property(mut self, property: impl Into<String>) -> Self {
        self.stickiness_property = Some(property.into());
        self
    }
}

/// A reusable named condition referenced by experiments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Unique identifier within a configuration
    pub id: String,
    /// Serialized boolean expression, opaque to this subsystem
    pub condition: String,
}

impl TargetGroup {
    /// Create a target group
    #[must_use]
    pub fn new(id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
        }
    }
}

/// The authoritative configuration snapshot
///
/// Constructed only by a fully successful parse+verify cycle and swapped
/// into the shared current-configuration reference atomically. Equality is
/// structural and is what the sync layer uses to compute `has_changes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Experiments in document order
    pub experiments: Vec<Experiment>,
    /// Target groups in document order
    pub target_groups: Vec<TargetGroup>,
    /// Timestamp from the signed envelope, absent for Roxy documents
    pub signed_at: Option<DateTime<Utc>>,
}

impl Configuration {
    /// Create a configuration snapshot
    #[must_use]
    pub fn new(
        experiments: Vec<Experiment>,
        target_groups: Vec<TargetGroup>,
        signed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            experiments,
            target_groups,
            signed_at,
        }
    }

    /// Look up an experiment by its unique id
    #[must_use]
    pub fn experiment(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.id == id)
    }

    /// Look up a target group by its unique id
    #[must_use]
    pub fn target_group(&self, id: &str) -> Option<&TargetGroup> {
        self.target_groups.iter().find(|g| g.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Configuration {
        Configuration::new(
            vec![
                Experiment::new("exp1", "first", "true")
                    .with_flags(vec!["flag.a".to_string(), "flag.b".to_string()]),
                Experiment::new("exp2", "second", "false").archived(),
            ],
            vec![TargetGroup::new("tg1", "eq(\"beta\", property(\"group\"))")],
            None,
        )
    }

    #[test]
    fn experiment_lookup_by_id() {
        let config = sample();
        assert_eq!(config.experiment("exp1").unwrap().name, "first");
        assert!(config.experiment("missing").is_none());
    }

    #[test]
    fn target_group_lookup_by_id() {
        let config = sample();
        assert!(config.target_group("tg1").is_some());
        assert!(config.target_group("tg2").is_none());
    }

    #[test]
    fn experiment_defaults() {
        let exp = Experiment::new("id", "name", "cond");
        assert!(!exp.archived);
        assert!(exp.flags.is_empty());
        assert!(exp.labels.is_empty());
        assert!(exp.stickiness_property.is_none());
    }

    #[test]
    fn snapshot_serde_round_trip() {
        let config = sample();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn configuration_equality_is_structural() {
        assert_eq!(sample(), sample());

        let mut other = sample();
        other.experiments[0].archived = true;
        assert_ne!(sample(), other);
    }
}

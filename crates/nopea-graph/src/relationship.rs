use crate::identity::NodeId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Relationship kind (spec.md §3). Extensible: `Other` carries any
/// relation name beyond the three the deploy memory requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    Breaks,
    DeployedTo,
    DependsOn,
    Other(String),
}

impl Relation {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "breaks" => Self::Breaks,
            "deployed_to" => Self::DeployedTo,
            "depends_on" => Self::DependsOn,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Breaks => "breaks",
            Self::DeployedTo => "deployed_to",
            Self::DependsOn => "depends_on",
            Self::Other(s) => s.as_str(),
        })
    }
}

// Relation serializes as its plain string form so it round-trips
// through the graph snapshot and the occurrence artifact identically
// to how evidence/canonical names already do.
impl Serialize for Relation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Relation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A directed, typed, weighted edge keyed by `(source_id, relation,
/// target_id)` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: NodeId,
    pub relation: Relation,
    pub target_id: NodeId,
    /// EWMA of confidence observations, always in `[0, 1]`.
    pub weight: f64,
    pub observations: u64,
    pub first_seen: String,
    pub last_seen: String,
    /// Appended on every reinforcement, never overwritten.
    pub evidence: Vec<String>,
}

impl Relationship {
    #[must_use]
    pub fn key(&self) -> (NodeId, Relation, NodeId) {
        (self.source_id.clone(), self.relation.clone(), self.target_id.clone())
    }
}

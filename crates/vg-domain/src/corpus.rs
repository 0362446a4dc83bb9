//! Evidence corpus identity and analytical frameworks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Symbolic name of an evidence source. Unlike `WorkerId` this is an open
/// vocabulary driven by configuration (§6).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorpusId(String);

impl CorpusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorpusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-corpus configuration known to the Context Orchestrator and Fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusInfo {
    pub corpus_id: CorpusId,
    pub reliability_weight: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Analytical framework selected by the Context Orchestrator and used as a
/// structural scaffold by the Synthesis Stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Framework {
    #[serde(rename = "PMESII")]
    Pmesii,
    Dime,
    Swot,
    #[serde(rename = "none")]
    None,
}

impl Framework {
    /// The labeled sections used as the synthesis prompt's structural
    /// scaffold (§4.7).
    pub fn sections(&self) -> &'static [&'static str] {
        match self {
            Framework::Pmesii => &[
                "Political",
                "Military",
                "Economic",
                "Social",
                "Infrastructure",
                "Information",
            ],
            Framework::Dime => &["Diplomatic", "Information", "Military", "Economic"],
            Framework::Swot => &["Strengths", "Weaknesses", "Opportunities", "Threats"],
            Framework::None => &[],
        }
    }
}

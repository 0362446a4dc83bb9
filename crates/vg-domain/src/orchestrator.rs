//! Context Orchestrator (C3): maps a query to corpora + framework.

use crate::corpus::{CorpusId, Framework};

/// Closed set of themes the keyword classifier can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    ConflictSecurity,
    EconomyFinance,
    GovernanceDemocracy,
    DevelopmentSocial,
    Generic,
}

impl Theme {
    fn framework(self) -> Framework {
        match self {
            Theme::ConflictSecurity => Framework::Pmesii,
            Theme::EconomyFinance => Framework::Dime,
            Theme::GovernanceDemocracy => Framework::Pmesii,
            Theme::DevelopmentSocial => Framework::Swot,
            Theme::Generic => Framework::None,
        }
    }

    /// Preferred corpora for this theme, by tag. Intersected against the
    /// set of corpora actually configured.
    fn preferred_tags(self) -> &'static [&'static str] {
        match self {
            Theme::ConflictSecurity => &["conflict", "security"],
            Theme::EconomyFinance => &["economy", "finance"],
            Theme::GovernanceDemocracy => &["governance", "democracy"],
            Theme::DevelopmentSocial => &["development", "social"],
            Theme::Generic => &[],
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Theme::ConflictSecurity => &["conflict", "war", "attack", "militia", "violence", "security", "insurgency"],
            Theme::EconomyFinance => &["economy", "economic", "trade", "gdp", "inflation", "sanction", "finance", "imf"],
            Theme::GovernanceDemocracy => &["election", "government", "governance", "democracy", "parliament", "coup"],
            Theme::DevelopmentSocial => &["development", "poverty", "health", "education", "humanitarian", "refugee"],
            Theme::Generic => &[],
        }
    }

    fn classify(query_lower: &str) -> Theme {
        for theme in [
            Theme::ConflictSecurity,
            Theme::EconomyFinance,
            Theme::GovernanceDemocracy,
            Theme::DevelopmentSocial,
        ] {
            if theme.keywords().iter().any(|kw| query_lower.contains(kw)) {
                return theme;
            }
        }
        Theme::Generic
    }
}

/// Result of the Context Orchestrator's `select` operation.
#[derive(Debug, Clone)]
pub struct OrchestratorSelection {
    pub corpora: Vec<CorpusId>,
    pub framework: Framework,
}

/// Map `query_text` to `{ corpora, framework }` per §4.3.
///
/// `available` is the ordered set of corpora known to the running process,
/// each carrying its tags; corpora are filtered to `available` so a theme's
/// preferred list never selects a corpus the deployment doesn't have.
pub fn select(
    query_text: &str,
    available: &[(CorpusId, Vec<String>)],
) -> OrchestratorSelection {
    let query_lower = query_text.to_lowercase();
    let theme = Theme::classify(&query_lower);

    let corpora = if theme == Theme::Generic {
        available.iter().map(|(id, _)| id.clone()).collect()
    } else {
        let preferred = theme.preferred_tags();
        let matched: Vec<CorpusId> = available
            .iter()
            .filter(|(_, tags)| tags.iter().any(|t| preferred.contains(&t.as_str())))
            .map(|(id, _)| id.clone())
            .collect();
        if matched.is_empty() {
            available.iter().map(|(id, _)| id.clone()).collect()
        } else {
            matched
        }
    };

    OrchestratorSelection {
        corpora,
        framework: theme.framework(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpora() -> Vec<(CorpusId, Vec<String>)> {
        vec![
            (CorpusId::new("acled"), vec!["conflict".into()]),
            (CorpusId::new("imf"), vec!["economy".into()]),
            (CorpusId::new("freedom_house"), vec!["governance".into()]),
        ]
    }

    #[test]
    fn conflict_theme_selects_pmesii() {
        let sel = select("Conflict escalation in Sudan", &corpora());
        assert_eq!(sel.framework, Framework::Pmesii);
        assert_eq!(sel.corpora, vec![CorpusId::new("acled")]);
    }

    #[test]
    fn unclassified_query_falls_back_to_none_and_all_corpora() {
        let sel = select("What is the weather like", &corpora());
        assert_eq!(sel.framework, Framework::None);
        assert_eq!(sel.corpora.len(), corpora().len());
    }

    #[test]
    fn determinism_same_input_same_output() {
        let a = select("Economic leverage on Ukraine", &corpora());
        let b = select("Economic leverage on Ukraine", &corpora());
        assert_eq!(a.corpora, b.corpora);
        assert_eq!(a.framework, b.framework);
    }
}

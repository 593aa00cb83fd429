//! Heuristic classifiers over turn data.
//!
//! - [`PhaseTable`]: project phase from skills, file paths and text
//! - [`SkillCatalog`]: why a skill was introduced, and which skills a text suggests
//!
//! Both are immutable once built; extra skill keywords are registered through
//! [`SkillCatalog::builder`] at startup.

pub mod phase;
pub mod skill;

pub use phase::{PathPattern, PhaseInputs, PhaseSignals, PhaseTable};
pub use skill::{Introduction, Recommendation, SkillCatalog, SkillCatalogBuilder};

use crate::config::InferenceConfig;

/// Build the skill catalog: built-in skills plus configured keywords.
pub fn catalog_from_config(config: &InferenceConfig) -> SkillCatalog {
    config
        .skill_keywords
        .iter()
        .fold(SkillCatalog::builder().with_defaults(), |builder, (name, keywords)| {
            builder.register(name.clone(), keywords.iter().cloned())
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;

    #[test]
    fn test_catalog_from_config() {
        let mut config = InferenceConfig::default();
        config
            .skill_keywords
            .insert("house-style".to_string(), vec!["lint".to_string(), "format".to_string()]);

        let catalog = catalog_from_config(&config);
        assert!(catalog.known_skills().contains(&"house-style"));
        assert!(catalog.known_skills().contains(&"dev-coding"));
        assert_eq!(
            catalog.infer_introduction("lint and format", "house-style").confidence,
            Confidence::High
        );
    }
}

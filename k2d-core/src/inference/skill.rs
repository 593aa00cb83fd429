//! Why a skill was introduced, inferred from the surrounding conversation.

use crate::types::Confidence;

/// Built-in skills and the keywords that suggest them.
const DEFAULT_SKILLS: &[(&str, &[&str])] = &[
    ("meta-42cog", &["新项目", "开始", "初始化", "init", "约束", "规范", "框架"]),
    (
        "pm-product-requirements",
        &["需求", "功能", "用户", "PRD", "requirement", "产品", "特性", "feature"],
    ),
    ("pm-user-story", &["用户故事", "user story", "故事", "场景", "scenario"]),
    (
        "dev-system-architecture",
        &["架构", "设计", "技术方案", "architecture", "系统设计", "模块"],
    ),
    (
        "dev-database-design",
        &["数据库", "表", "schema", "database", "model", "模型", "DB", "SQL"],
    ),
    ("dev-coding", &["实现", "开发", "写代码", "implement", "code", "编码", "编写"]),
    ("dev-ui-design", &["UI", "界面", "前端", "组件", "样式", "design", "frontend"]),
    (
        "dev-quality-assurance",
        &["测试", "bug", "修复", "test", "fix", "QA", "质量", "单测"],
    ),
    ("dev-deployment-v1", &["部署", "上线", "发布", "deploy", "release", "上传", "生产"]),
    ("skill-creator", &["技能", "skill", "创建技能", "新技能"]),
    (
        "creative-intelligence",
        &["头脑风暴", "创意", "构思", "研究", "SCAMPER", "brainstorm"],
    ),
    ("deep-reading-analyst", &["分析", "理解", "阅读", "文章", "论文", "深入"]),
];

/// Inferred introduction reason for one skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Introduction {
    pub reason: String,
    pub confidence: Confidence,
    /// Keywords found in the context, in catalog order
    pub keywords: Vec<String>,
}

/// A skill the context suggests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub skill: String,
    pub confidence: Confidence,
}

/// Immutable skill to keyword catalog.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    skills: Vec<(String, Vec<String>)>,
}

/// Builder for [`SkillCatalog`].
#[derive(Debug, Default)]
pub struct SkillCatalogBuilder {
    skills: Vec<(String, Vec<String>)>,
}

impl SkillCatalogBuilder {
    /// Register the built-in skills.
    pub fn with_defaults(mut self) -> Self {
        for (name, keywords) in DEFAULT_SKILLS {
            self = self.register(*name, keywords.iter().copied());
        }
        self
    }

    /// Add keywords for `name`, creating the skill if it is new.
    pub fn register<I, S>(mut self, name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        match self.skills.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(keywords),
            None => self.skills.push((name, keywords)),
        }
        self
    }

    pub fn build(self) -> SkillCatalog {
        SkillCatalog {
            skills: self.skills,
        }
    }
}

impl Default for SkillCatalog {
    fn default() -> Self {
        SkillCatalog::builder().with_defaults().build()
    }
}

impl SkillCatalog {
    pub fn builder() -> SkillCatalogBuilder {
        SkillCatalogBuilder::default()
    }

    pub fn known_skills(&self) -> Vec<&str> {
        self.skills.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn matches<'a>(keywords: &'a [String], context_lower: &str) -> Vec<&'a String> {
        keywords
            .iter()
            .filter(|k| context_lower.contains(&k.to_lowercase()))
            .collect()
    }

    fn keywords(&self, skill: &str) -> &[String] {
        self.skills
            .iter()
            .find(|(name, _)| name == skill)
            .map(|(_, keywords)| keywords.as_slice())
            .unwrap_or(&[])
    }

    /// Why `skill` was likely introduced, judging by `context`.
    pub fn infer_introduction(&self, context: &str, skill: &str) -> Introduction {
        let context = context.to_lowercase();
        let matched: Vec<String> = Self::matches(self.keywords(skill), &context)
            .into_iter()
            .cloned()
            .collect();

        let (reason, confidence) = match matched.len() {
            0 => (
                "No clear trigger keywords found in the context".to_string(),
                Confidence::Low,
            ),
            1 => (
                format!("Request mentions \"{}\", {} may be needed", matched[0], skill),
                Confidence::Medium,
            ),
            _ => (
                format!(
                    "Request relates to \"{}\", which triggered {}",
                    matched.join(", "),
                    skill
                ),
                Confidence::High,
            ),
        };

        Introduction {
            reason,
            confidence,
            keywords: matched,
        }
    }

    /// [`infer_introduction`](Self::infer_introduction) for each skill, in order.
    pub fn infer_introductions<'s>(
        &self,
        context: &str,
        skills: &'s [String],
    ) -> Vec<(&'s str, Introduction)> {
        skills
            .iter()
            .map(|skill| (skill.as_str(), self.infer_introduction(context, skill)))
            .collect()
    }

    /// Skills with at least one keyword in `context`, most matches first.
    pub fn recommend(&self, context: &str) -> Vec<Recommendation> {
        let context = context.to_lowercase();
        let mut scored: Vec<(usize, Recommendation)> = self
            .skills
            .iter()
            .filter_map(|(name, keywords)| {
                let score = Self::matches(keywords, &context).len();
                let confidence = match score {
                    0 => return None,
                    1 => Confidence::Medium,
                    _ => Confidence::High,
                };
                Some((
                    score,
                    Recommendation {
                        skill: name.clone(),
                        confidence,
                    },
                ))
            })
            .collect();

        // Stable: equal scores keep catalog order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = SkillCatalog::default();
        let skills = catalog.known_skills();
        assert_eq!(skills.len(), 12);
        assert_eq!(skills[0], "meta-42cog");
        assert!(skills.contains(&"deep-reading-analyst"));
    }

    #[test]
    fn test_confidence_levels() {
        let catalog = SkillCatalog::default();

        let high = catalog.infer_introduction("Please DEPLOY the release", "dev-deployment-v1");
        assert_eq!(high.confidence, Confidence::High);
        assert_eq!(high.keywords, vec!["deploy", "release"]);
        assert!(high.reason.contains("deploy, release"));

        let medium = catalog.infer_introduction("fix the login", "dev-quality-assurance");
        assert_eq!(medium.confidence, Confidence::Medium);
        assert_eq!(medium.keywords, vec!["fix"]);

        let low = catalog.infer_introduction("hello", "dev-coding");
        assert_eq!(low.confidence, Confidence::Low);
        assert!(low.keywords.is_empty());

        let unknown = catalog.infer_introduction("deploy release", "not-a-skill");
        assert_eq!(unknown.confidence, Confidence::Low);
    }

    #[test]
    fn test_register_extends_and_adds() {
        let catalog = SkillCatalog::builder()
            .with_defaults()
            .register("dev-coding", ["scaffold"])
            .register("my-skill", vec!["alpha".to_string(), "beta".to_string()])
            .build();

        assert_eq!(catalog.known_skills().len(), 13);
        assert_eq!(
            catalog.infer_introduction("scaffold it", "dev-coding").confidence,
            Confidence::Medium
        );
        assert_eq!(
            catalog.infer_introduction("alpha and beta", "my-skill").confidence,
            Confidence::High
        );
    }

    #[test]
    fn test_recommend_sorted_by_score() {
        let catalog = SkillCatalog::default();
        let recs = catalog.recommend("deploy the release after we fix the bug in the test");
        assert_eq!(recs[0].skill, "dev-quality-assurance");
        assert_eq!(recs[0].confidence, Confidence::High);
        assert_eq!(recs[1].skill, "dev-deployment-v1");
        assert!(recs.iter().all(|r| r.confidence != Confidence::Low));

        assert!(catalog.recommend("zzz").is_empty());
    }

    #[test]
    fn test_infer_introductions_keeps_order() {
        let catalog = SkillCatalog::default();
        let skills = vec!["dev-coding".to_string(), "skill-creator".to_string()];
        let results = catalog.infer_introductions("implement the code", &skills);
        assert_eq!(results[0].0, "dev-coding");
        assert_eq!(results[0].1.confidence, Confidence::High);
        assert_eq!(results[1].1.confidence, Confidence::Low);
    }
}

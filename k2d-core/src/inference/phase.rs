//! Project phase inference from skills, touched files and free text.
//!
//! Each [`Phase`] has three kinds of signals: skill names, file path patterns
//! and keywords (English and Chinese). The table order is the lifecycle order
//! and doubles as the priority order.

use crate::types::Phase;
use regex::Regex;

/// Words in a signal text that mark a skill as newly introduced.
const INTRODUCTION_MARKERS: &[&str] = &["introduced", "引入"];

/// A path pattern with an optional exclusion (e.g. "source file, but not a test").
#[derive(Debug, Clone)]
pub struct PathPattern {
    include: Regex,
    exclude: Option<Regex>,
}

impl PathPattern {
    pub fn new(include: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            include: Regex::new(include)?,
            exclude: None,
        })
    }

    pub fn excluding(mut self, exclude: &str) -> Result<Self, regex::Error> {
        self.exclude = Some(Regex::new(exclude)?);
        Ok(self)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.as_ref().is_some_and(|re| re.is_match(path))
    }
}

/// Signals associated with one phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseSignals {
    pub skills: Vec<String>,
    pub paths: Vec<PathPattern>,
    pub keywords: Vec<String>,
}

/// What a combined inference looks at. Empty inputs are skipped.
#[derive(Debug, Clone, Default)]
pub struct PhaseInputs<'a> {
    pub skills: &'a [String],
    pub paths: &'a [String],
    pub context: Option<&'a str>,
}

/// The phase signal table.
#[derive(Debug, Clone)]
pub struct PhaseTable {
    phases: Vec<(Phase, PhaseSignals)>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn patterns(items: &[&str]) -> Vec<PathPattern> {
    items
        .iter()
        .map(|p| PathPattern::new(p).expect("built-in phase pattern must compile"))
        .collect()
}

impl Default for PhaseTable {
    fn default() -> Self {
        // Script sources, but not their .test/.spec siblings
        let script_file = |ext: &str| {
            PathPattern::new(&format!(r"\.{}$", ext))
                .and_then(|p| p.excluding(&format!(r"\.(test|spec)\.{}$", ext)))
                .expect("built-in phase pattern must compile")
        };

        Self::new(vec![
            (
                Phase::Init,
                PhaseSignals {
                    skills: strings(&["meta-42cog", "skill-creator"]),
                    paths: patterns(&[r"\.42cog/", r"(?i)CLAUDE\.md$", r"package\.json$"]),
                    keywords: strings(&["初始化", "新项目", "init", "开始", "创建"]),
                },
            ),
            (
                Phase::Requirements,
                PhaseSignals {
                    skills: strings(&["pm-product-requirements", "pm-user-story"]),
                    paths: patterns(&[
                        r"(?i)prd\.md$",
                        r"(?i)requirements?\.md$",
                        r"(?i)\.42cog/spec/.*prd",
                    ]),
                    keywords: strings(&["需求", "PRD", "功能", "用户故事", "requirement"]),
                },
            ),
            (
                Phase::Design,
                PhaseSignals {
                    skills: strings(&[
                        "dev-system-architecture",
                        "dev-database-design",
                        "dev-ui-design",
                    ]),
                    paths: patterns(&[
                        r"(?i)architecture\.md$",
                        r"(?i)schema\.sql$",
                        r"(?i)design\.md$",
                        r"\.42cog/spec/",
                    ]),
                    keywords: strings(&["架构", "设计", "schema", "数据库设计", "UI设计"]),
                },
            ),
            (
                Phase::Development,
                PhaseSignals {
                    skills: strings(&["dev-coding"]),
                    paths: [script_file("tsx?"), script_file("jsx?")]
                        .into_iter()
                        .chain(patterns(&[r"\.py$", r"\.go$", r"\.rs$"]))
                        .collect(),
                    keywords: strings(&["实现", "开发", "编码", "implement", "代码"]),
                },
            ),
            (
                Phase::Testing,
                PhaseSignals {
                    skills: strings(&["dev-quality-assurance"]),
                    paths: patterns(&[
                        r"\.test\.[jt]sx?$",
                        r"\.spec\.[jt]sx?$",
                        r"__tests__/",
                        r"(?i)test.*\.[jt]sx?$",
                        r"(?i)spec.*\.[jt]sx?$",
                    ]),
                    keywords: strings(&["测试", "test", "bug", "修复", "QA"]),
                },
            ),
            (
                Phase::Deployment,
                PhaseSignals {
                    skills: strings(&["dev-deployment-v1"]),
                    paths: patterns(&[
                        r"(?i)dockerfile$",
                        r"\.yml$",
                        r"\.yaml$",
                        r"deploy",
                        r"(?i)ci/cd",
                    ]),
                    keywords: strings(&["部署", "上线", "发布", "deploy", "release"]),
                },
            ),
            (
                Phase::Maintenance,
                PhaseSignals {
                    skills: Vec::new(),
                    paths: Vec::new(),
                    keywords: strings(&["维护", "优化", "重构", "refactor", "修复"]),
                },
            ),
        ])
    }
}

impl PhaseTable {
    /// Build a table from explicit signals. Entries are kept in the given order.
    pub fn new(phases: Vec<(Phase, PhaseSignals)>) -> Self {
        Self { phases }
    }

    pub fn signals(&self, phase: Phase) -> Option<&PhaseSignals> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, s)| s)
    }

    /// Earliest phase whose skill set contains one of `skills`.
    pub fn from_skills(&self, skills: &[String]) -> Phase {
        self.phases
            .iter()
            .find(|(_, signals)| signals.skills.iter().any(|s| skills.contains(s)))
            .map(|(phase, _)| *phase)
            .unwrap_or(Phase::Development)
    }

    /// Phase whose path patterns match the most of `paths`.
    pub fn from_files(&self, paths: &[String]) -> Phase {
        self.highest(|signals| {
            paths
                .iter()
                .map(|path| signals.paths.iter().filter(|p| p.is_match(path)).count())
                .sum()
        })
    }

    /// Phase whose keywords occur most in `context` (case-insensitive).
    pub fn from_context(&self, context: &str) -> Phase {
        let context = context.to_lowercase();
        self.highest(|signals| count_keywords(&signals.keywords, &context))
    }

    /// `development` unless another phase scores strictly higher; among
    /// those, the first in table order wins.
    fn highest<F>(&self, score: F) -> Phase
    where
        F: Fn(&PhaseSignals) -> usize,
    {
        let mut best = (Phase::Development, 0);
        for (phase, signals) in &self.phases {
            let s = score(signals);
            if s > best.1 {
                best = (*phase, s);
            }
        }
        best.0
    }

    /// Majority vote over the applicable sub-inferences.
    ///
    /// Sub-inferences run in the order skills, files, context. On a tie the
    /// earliest result wins. Without any input the phase is `development`.
    pub fn infer(&self, inputs: &PhaseInputs<'_>) -> Phase {
        let mut results = Vec::new();
        if !inputs.skills.is_empty() {
            results.push(self.from_skills(inputs.skills));
        }
        if !inputs.paths.is_empty() {
            results.push(self.from_files(inputs.paths));
        }
        if let Some(context) = inputs.context.filter(|c| !c.is_empty()) {
            results.push(self.from_context(context));
        }

        let Some(&first) = results.first() else {
            return Phase::Development;
        };

        // (phase, votes) in first-seen order
        let mut tally: Vec<(Phase, usize)> = Vec::new();
        for phase in &results {
            match tally.iter_mut().find(|(p, _)| p == phase) {
                Some((_, votes)) => *votes += 1,
                None => tally.push((*phase, 1)),
            }
        }

        let mut best = (first, 1);
        for (phase, votes) in tally {
            if votes > best.1 {
                best = (phase, votes);
            }
        }
        best.0
    }

    /// A phase other than `current` that the signal texts point to, if any.
    ///
    /// A phase qualifies when one of its skills is named alongside an
    /// introduction marker, or when at least two of its keywords occur.
    /// The first qualifying phase in table order wins.
    pub fn detect_transition<S: AsRef<str>>(&self, current: Phase, signals: &[S]) -> Option<Phase> {
        let text = signals
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let introduced = INTRODUCTION_MARKERS.iter().any(|m| text.contains(m));

        self.phases
            .iter()
            .filter(|(phase, _)| *phase != current)
            .find(|(_, signals)| {
                let skill_introduced = introduced
                    && signals
                        .skills
                        .iter()
                        .any(|skill| text.contains(&skill.to_lowercase()));
                skill_introduced || count_keywords(&signals.keywords, &text) >= 2
            })
            .map(|(phase, _)| *phase)
    }
}

/// Number of `keywords` found in the already lower-cased `text`.
fn count_keywords(keywords: &[String], text: &str) -> usize {
    keywords
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .count()
}

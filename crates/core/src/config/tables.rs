use std::collections::HashMap;

use regex::{Match, Regex};

use super::{Config, FieldLabels, Thresholds};
use crate::code::OptimizationDetector;
use crate::config::ExtractionConfig;
use crate::error::ConfigError;
use crate::finding::{Difficulty, Domain, OptimizationKind, Severity};
use crate::patterns::{compile, Patterns};

/// Immutable compiled form of a [`Config`]. Built once, shared by reference.
#[derive(Debug, Clone)]
pub struct Tables {
    pub thresholds: Thresholds,
    pub extraction: ExtractionConfig,
    pub severity: CueTable<Severity>,
    pub difficulty: CueTable<Difficulty>,
    pub security_keywords: KeywordSet,
    pub gas_keywords: KeywordSet,
    pub finding_headers: KeywordSet,
    /// Catalogue in matching priority order; `Generic` is never listed.
    pub catalogue: Vec<(OptimizationKind, KeywordSet)>,
    pub before_cues: KeywordSet,
    pub after_cues: KeywordSet,
    pub template_signatures: KeywordSet,
    pub labels: LabelSet,
    pub metadata: Vec<Regex>,
    pub patterns: Patterns,
    pub optimization: OptimizationDetector,
}

impl Tables {
    pub fn compile(config: &Config) -> Result<Self, ConfigError> {
        let thresholds = config.thresholds;
        if thresholds.max_title_len == 0 {
            return Err(ConfigError::InvalidThreshold("max_title_len"));
        }
        if thresholds.context_window == 0 {
            return Err(ConfigError::InvalidThreshold("context_window"));
        }

        let cues = &config.severity;
        let severity = CueTable::new(vec![
            (Severity::Critical, KeywordSet::new("severity.critical", &cues.critical)?),
            (Severity::High, KeywordSet::new("severity.high", &cues.high)?),
            (Severity::Medium, KeywordSet::new("severity.medium", &cues.medium)?),
            (Severity::Low, KeywordSet::new("severity.low", &cues.low)?),
            (
                Severity::Informational,
                KeywordSet::new("severity.informational", &cues.informational)?,
            ),
        ]);

        let cues = &config.difficulty;
        let difficulty = CueTable::new(vec![
            (Difficulty::Easy, KeywordSet::new("difficulty.easy", &cues.easy)?),
            (Difficulty::Medium, KeywordSet::new("difficulty.medium", &cues.medium)?),
            (Difficulty::Hard, KeywordSet::new("difficulty.hard", &cues.hard)?),
        ]);

        let mut catalogue = Vec::new();
        for kind in OptimizationKind::ALL {
            if kind == OptimizationKind::Generic {
                continue;
            }
            let name = format!("optimization_catalogue.{}", kind.label());
            let keywords = config.optimization_catalogue.keywords(kind);
            catalogue.push((kind, KeywordSet::new(&name, keywords)?));
        }

        let metadata = config
            .cleaning
            .metadata_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            thresholds,
            extraction: config.extraction,
            severity,
            difficulty,
            security_keywords: KeywordSet::new("keywords.security", &config.keywords.security)?,
            gas_keywords: KeywordSet::new("keywords.gas", &config.keywords.gas)?,
            finding_headers: KeywordSet::new(
                "keywords.finding_headers",
                &config.keywords.finding_headers,
            )?,
            catalogue,
            before_cues: KeywordSet::new("code_context.before", &config.code_context.before)?,
            after_cues: KeywordSet::new("code_context.after", &config.code_context.after)?,
            template_signatures: KeywordSet::new(
                "templates.signatures",
                &config.templates.signatures,
            )?,
            labels: LabelSet::new(&config.field_labels)?,
            metadata,
            patterns: Patterns::compile()?,
            optimization: OptimizationDetector::new()?,
        })
    }

    pub fn domain_keywords(&self, domain: Domain) -> &KeywordSet {
        match domain {
            Domain::Security => &self.security_keywords,
            Domain::GasOptimization => &self.gas_keywords,
        }
    }
}

/// Case-insensitive matcher over a keyword list. Keywords that start or end with a
/// word character are matched on word boundaries, so `low` never matches `allowing`.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    regex: Regex,
}

impl KeywordSet {
    pub fn new(name: &str, keywords: &[String]) -> Result<Self, ConfigError> {
        let mut words: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if words.is_empty() {
            return Err(ConfigError::EmptyTable(name.to_string()));
        }
        // Longest first so alternation prefers `access control` over `access`.
        words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        words.dedup();

        let alternation = words
            .iter()
            .map(|w| bounded(w))
            .collect::<Vec<_>>()
            .join("|");
        let regex = compile(&format!("(?i)(?:{})", alternation))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.regex.find(text)
    }

    /// Start offset of the last keyword occurrence.
    pub fn last(&self, text: &str) -> Option<usize> {
        self.regex.find_iter(text).last().map(|m| m.start())
    }

    pub fn count(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }
}

fn bounded(word: &str) -> String {
    let escaped = regex::escape(word).replace(' ', r"\s+");
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let start = if is_word(word.chars().next()) { r"\b" } else { "" };
    let end = if is_word(word.chars().last()) { r"\b" } else { "" };
    format!("{}{}{}", start, escaped, end)
}

/// Ordered cue words per level of a closed scale.
#[derive(Debug, Clone)]
pub struct CueTable<L> {
    levels: Vec<(L, KeywordSet)>,
}

impl<L: Copy> CueTable<L> {
    pub fn new(levels: Vec<(L, KeywordSet)>) -> Self {
        Self { levels }
    }

    /// Level of the earliest cue in `text`. Cues at the same offset go to the level listed first.
    pub fn earliest(&self, text: &str) -> Option<L> {
        let mut best: Option<(usize, L)> = None;
        for (level, set) in &self.levels {
            if let Some(m) = set.find(text) {
                if best.map_or(true, |(pos, _)| m.start() < pos) {
                    best = Some((m.start(), *level));
                }
            }
        }
        best.map(|(_, level)| level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Title,
    Description,
    AttackScenario,
    Remediation,
    Location,
    Severity,
    Difficulty,
    Savings,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMatch<'t> {
    pub kind: LabelKind,
    /// Text following the label on the same line.
    pub rest: &'t str,
}

/// Recognizes sub-block label lines such as `**Remediation:** use a mutex` or `### Description`.
#[derive(Debug, Clone)]
pub struct LabelSet {
    line: Regex,
    heading: Regex,
    inline: HashMap<LabelKind, Regex>,
    kinds: HashMap<String, LabelKind>,
}

impl LabelSet {
    pub fn new(labels: &FieldLabels) -> Result<Self, ConfigError> {
        let groups: [(LabelKind, &[String]); 9] = [
            (LabelKind::Title, &labels.title),
            (LabelKind::Description, &labels.description),
            (LabelKind::AttackScenario, &labels.attack_scenario),
            (LabelKind::Remediation, &labels.remediation),
            (LabelKind::Location, &labels.location),
            (LabelKind::Severity, &labels.severity),
            (LabelKind::Difficulty, &labels.difficulty),
            (LabelKind::Savings, &labels.savings),
            (LabelKind::Other, &labels.other),
        ];

        let mut kinds = HashMap::new();
        let mut inline = HashMap::new();
        for (kind, words) in groups {
            if words.is_empty() && kind != LabelKind::Other {
                return Err(ConfigError::EmptyTable(format!("field_labels.{:?}", kind)));
            }
            for word in words {
                kinds.entry(normalize_label(word)).or_insert(kind);
            }
            if matches!(kind, LabelKind::Severity | LabelKind::Difficulty) {
                let pattern = format!(
                    r"(?i)\b(?:{})[ \t]*(?:\*\*|__)?[ \t]*[:=][ \t]*(?:\*\*|__)?[ \t]*(?P<value>[A-Za-z]+)",
                    alternation(words)
                );
                inline.insert(kind, compile(&pattern)?);
            }
        }

        let all: Vec<String> = kinds.keys().cloned().collect();
        let alt = alternation(&all);
        let line = compile(&format!(
            r"(?i)^[ \t]*(?:[-*+][ \t]+|\d{{1,2}}[.)][ \t]+)?(?:#{{1,6}}[ \t]*)?(?:\*\*|__)?[ \t]*(?P<label>{})[ \t]*(?:\*\*|__)?[ \t]*:[ \t]*(?:\*\*|__)?[ \t]*(?P<rest>.*?)[ \t]*$",
            alt
        ))?;
        let heading = compile(&format!(
            r"(?i)^[ \t]*(?:#{{1,6}}[ \t]*|(?:[-*+][ \t]+)?(?:\*\*|__))[ \t]*(?P<label>{})[ \t]*(?:\*\*|__)?[ \t]*:?[ \t]*(?:\*\*|__)?[ \t]*$",
            alt
        ))?;

        Ok(Self {
            line,
            heading,
            inline,
            kinds,
        })
    }

    /// Match a whole line against the label forms `Label: rest` and `## Label` / `**Label**`.
    pub fn match_line<'t>(&self, line: &'t str) -> Option<LabelMatch<'t>> {
        if let Some(caps) = self.line.captures(line) {
            let kind = self.kind_of(caps.name("label")?.as_str())?;
            let rest = caps.name("rest").map_or("", |m| m.as_str());
            return Some(LabelMatch { kind, rest });
        }
        let caps = self.heading.captures(line)?;
        let kind = self.kind_of(caps.name("label")?.as_str())?;
        Some(LabelMatch { kind, rest: "" })
    }

    pub fn is_label_line(&self, line: &str) -> bool {
        self.match_line(line).is_some()
    }

    /// Whether a heading's cleaned title is just a field label (`Description`, `Fix`).
    pub fn is_label_title(&self, title: &str) -> bool {
        self.kinds
            .contains_key(&normalize_label(title.trim_end_matches(':')))
    }

    /// Value of an inline `Severity: High` / `Difficulty: Easy` anywhere in the text.
    pub fn inline_value<'t>(&self, kind: LabelKind, text: &'t str) -> Option<&'t str> {
        let regex = self.inline.get(&kind)?;
        regex
            .captures_iter(text)
            .filter_map(|caps| caps.name("value"))
            .map(|m| m.as_str())
            .next()
    }

    fn kind_of(&self, label: &str) -> Option<LabelKind> {
        self.kinds.get(&normalize_label(label)).copied()
    }
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn alternation(words: &[String]) -> String {
    let mut words: Vec<&str> = words.iter().map(|w| w.trim()).filter(|w| !w.is_empty()).collect();
    words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    words.dedup();
    words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"[ \t]+"))
        .collect::<Vec<_>>()
        .join("|")
}

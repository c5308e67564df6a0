//! Catalogue Parser
//!
//! Deterministic extraction of a structured catalogue from admin free text.
//! The pass scans a fixed keyword dictionary, applies keyword-triggered
//! sub-rules per metric, and scores its own confidence additively. Identical
//! text always yields an identical `ParsedCatalogue`; a failure while
//! deriving one metric becomes a warning and never aborts the rest of the
//! parse. This heuristic layer is one concrete implementation behind the
//! stable `parse` boundary.

use regex::Regex;

use crate::catalogue::policy::TWICE_DAILY_SCHEDULE;
use crate::catalogue::{
    EscalationPolicy, FieldDefinition, FieldType, MetricDefinition, ParsedCatalogue,
    ReminderPolicy, RetentionPolicy,
};

mod keywords;

use keywords::{
    MetricKeyword, ESCALATION_VOCAB, METRIC_KEYWORDS, REQUIREMENT_VOCAB, SCHEDULE_PHRASES,
    SCHEDULE_VOCAB, TRACKING_VOCAB, UNIT_ALIASES, VOLUME_UNITS, WEIGHT_UNITS,
};

pub(crate) const TWICE_DAILY: &str = TWICE_DAILY_SCHEDULE;

/// Heuristic free-text parser. Synchronous, reentrant, no shared state.
pub struct CatalogueParser {
    timezone: String,
    keyword_patterns: Vec<(Regex, &'static MetricKeyword)>,
    unit_patterns: Vec<(Regex, &'static str)>,
    retention_re: Regex,
}

impl CatalogueParser {
    pub fn new() -> Self {
        Self::with_timezone("UTC")
    }

    /// Parser whose derived reminder policies carry the given timezone.
    pub fn with_timezone(timezone: impl Into<String>) -> Self {
        let keyword_patterns = METRIC_KEYWORDS
            .iter()
            .map(|kw| (word_pattern(kw.keyword), kw))
            .collect();
        let unit_patterns = UNIT_ALIASES
            .iter()
            .map(|(alias, canonical)| (word_pattern(alias), *canonical))
            .collect();
        let retention_re =
            Regex::new(r"keep\b[^.;]*?\b(\d{1,5})\s*days?").expect("valid retention pattern");

        Self {
            timezone: timezone.into(),
            keyword_patterns,
            unit_patterns,
            retention_re,
        }
    }

    /// Parse admin free text into a structured catalogue description.
    ///
    /// Pure and deterministic; never fails outright. Problems surface as
    /// warnings plus a lowered confidence score.
    pub fn parse(
        &self,
        source_text: &str,
        rule_set_id: Option<&str>,
        admin_id: Option<&str>,
    ) -> ParsedCatalogue {
        let text = source_text.to_lowercase();
        let units = self.detect_units(&text);
        let schedule = derive_schedule(&text);
        let escalation = derive_escalation(&text);

        let mut metrics = Vec::new();
        let mut warnings = Vec::new();
        for (pattern, keyword) in &self.keyword_patterns {
            if !pattern.is_match(&text) {
                continue;
            }
            match self.derive_metric(keyword, &text, &units, schedule, escalation.clone()) {
                Ok(metric) => metrics.push(metric),
                Err(reason) => {
                    warnings.push(format!("metric '{}' skipped: {reason}", keyword.slug))
                }
            }
        }

        let retention = self.derive_retention(&text, &mut warnings);
        let confidence = score_confidence(&metrics, &text, &units, &warnings);

        ParsedCatalogue {
            metrics,
            retention,
            confidence,
            warnings,
            rule_set_id: rule_set_id.map(str::to_string),
            admin_id: admin_id.map(str::to_string),
        }
    }

    /// Canonical units mentioned in the text, in dictionary order, deduped.
    fn detect_units(&self, text: &str) -> Vec<&'static str> {
        let mut found = Vec::new();
        for (pattern, canonical) in &self.unit_patterns {
            if pattern.is_match(text) && !found.contains(canonical) {
                found.push(*canonical);
            }
        }
        found
    }

    /// Derive one metric from its keyword. Failures are reported to the
    /// caller, which downgrades them to warnings.
    pub(crate) fn derive_metric(
        &self,
        keyword: &MetricKeyword,
        text: &str,
        units: &[&'static str],
        schedule: &str,
        escalation: Option<EscalationPolicy>,
    ) -> Result<MetricDefinition, String> {
        let fields = derive_fields(keyword.slug, text, units)?;
        let metric = MetricDefinition {
            slug: keyword.slug.to_string(),
            display_name: keyword.display_name.to_string(),
            description: keyword.description.to_string(),
            fields,
            reminder_policy: ReminderPolicy {
                schedule: schedule.to_string(),
                timezone: self.timezone.clone(),
                escalation,
            },
            analytics_tags: keyword.tags.iter().map(|t| t.to_string()).collect(),
        };
        metric.validate().map_err(|e| e.to_string())?;
        Ok(metric)
    }

    fn derive_retention(&self, text: &str, warnings: &mut Vec<String>) -> RetentionPolicy {
        let mut retention = RetentionPolicy::default();
        if let Some(captures) = self.retention_re.captures(text) {
            match captures[1].parse::<u32>() {
                Ok(days) if days > 0 => retention.journal_retention_days = days,
                _ => warnings.push("retention phrase found but day count unusable".to_string()),
            }
        }
        retention
    }
}

impl Default for CatalogueParser {
    fn default() -> Self {
        Self::new()
    }
}

fn word_pattern(phrase: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(phrase))).expect("valid keyword pattern")
}

fn contains_any(text: &str, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|term| text.contains(term))
}

fn derive_schedule(text: &str) -> &'static str {
    for (phrase, expression) in SCHEDULE_PHRASES {
        if text.contains(phrase) {
            return expression;
        }
    }
    TWICE_DAILY
}

fn derive_escalation(text: &str) -> Option<EscalationPolicy> {
    contains_any(text, ESCALATION_VOCAB).then(EscalationPolicy::default)
}

/// Keyword-triggered field set per metric.
fn derive_fields(
    slug: &str,
    text: &str,
    units: &[&'static str],
) -> Result<Vec<FieldDefinition>, String> {
    let fields = match slug {
        "water-intake" => {
            let unit = first_unit(units, VOLUME_UNITS).unwrap_or("ml");
            let mut fields = vec![FieldDefinition::new("quantity", "Quantity", FieldType::Numeric)
                .with_unit(unit)
                .with_example("250")];
            if text.contains("source") || text.contains("type") {
                fields.push(
                    FieldDefinition::new("source", "Source", FieldType::Enum)
                        .with_enum_values(["tap", "bottled", "filtered", "sparkling", "other"])
                        .optional(),
                );
            }
            fields
        }
        "medication" => {
            let mut fields = vec![
                FieldDefinition::new("name", "Medication name", FieldType::Text)
                    .with_example("lisinopril"),
                FieldDefinition::new("taken", "Taken", FieldType::Boolean),
            ];
            if text.contains("dosage") || text.contains("dose") {
                fields.push(
                    FieldDefinition::new("dosage", "Dosage", FieldType::Text)
                        .with_example("10 mg")
                        .optional(),
                );
            }
            fields
        }
        "mood" => {
            let mut fields = vec![FieldDefinition::new("rating", "Mood rating", FieldType::Integer)
                .with_example("7")];
            if text.contains("note") {
                fields.push(FieldDefinition::new("note", "Note", FieldType::Text).optional());
            }
            fields
        }
        "sleep" => {
            let mut fields = vec![FieldDefinition::new("duration", "Duration", FieldType::Numeric)
                .with_unit("hours")
                .with_example("7.5")];
            if text.contains("quality") {
                fields.push(
                    FieldDefinition::new("quality", "Quality", FieldType::Enum)
                        .with_enum_values(["poor", "fair", "good", "excellent"])
                        .optional(),
                );
            }
            fields
        }
        "exercise" => {
            let mut fields = vec![FieldDefinition::new("duration", "Duration", FieldType::Numeric)
                .with_unit("minutes")
                .with_example("30")];
            if text.contains("type") || text.contains("activity") {
                fields.push(
                    FieldDefinition::new("activity", "Activity", FieldType::Enum)
                        .with_enum_values(["walk", "run", "swim", "cycle", "strength", "other"])
                        .optional(),
                );
            }
            fields
        }
        "blood-pressure" => {
            let mut fields = vec![
                FieldDefinition::new("systolic", "Systolic", FieldType::Integer)
                    .with_unit("mmHg")
                    .with_example("120"),
                FieldDefinition::new("diastolic", "Diastolic", FieldType::Integer)
                    .with_unit("mmHg")
                    .with_example("80"),
            ];
            if text.contains("pulse") || text.contains("heart rate") {
                fields.push(
                    FieldDefinition::new("pulse", "Pulse", FieldType::Integer)
                        .with_unit("bpm")
                        .optional(),
                );
            }
            fields
        }
        "weight" => {
            let unit = first_unit(units, WEIGHT_UNITS).unwrap_or("kg");
            vec![FieldDefinition::new("weight", "Weight", FieldType::Numeric)
                .with_unit(unit)
                .with_example("72.5")]
        }
        "steps" => vec![FieldDefinition::new("count", "Step count", FieldType::Integer)
            .with_unit("steps")
            .with_example("6000")],
        other => return Err(format!("no field derivation rule for '{other}'")),
    };
    Ok(fields)
}

fn first_unit(found: &[&'static str], preferred: &[&str]) -> Option<&'static str> {
    found.iter().copied().find(|unit| preferred.contains(unit))
}

fn score_confidence(
    metrics: &[MetricDefinition],
    text: &str,
    units: &[&'static str],
    warnings: &[String],
) -> f64 {
    let mut score: f64 = 0.0;
    if !metrics.is_empty() {
        score += 0.6;
    }
    if contains_any(text, TRACKING_VOCAB) {
        score += 0.1;
    }
    if contains_any(text, SCHEDULE_VOCAB) {
        score += 0.1;
    }
    if contains_any(text, REQUIREMENT_VOCAB) {
        score += 0.1;
    }
    if !units.is_empty() {
        score += 0.1;
    }
    score -= 0.05 * warnings.len() as f64;
    score.clamp(0.0, 1.0)
}

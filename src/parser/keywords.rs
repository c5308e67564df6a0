//! Fixed extraction dictionaries for the heuristic parser.
//!
//! Everything here is a compile-time constant scanned in declaration order,
//! which is what makes the parser deterministic. Extending the recognized
//! vocabulary means extending these tables, not touching the parse loop.

/// One recognizable metric keyword and the metric it seeds.
pub(crate) struct MetricKeyword {
    /// Phrase looked up in the normalized text (word-boundary match).
    pub keyword: &'static str,
    pub slug: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
}

pub(crate) const METRIC_KEYWORDS: &[MetricKeyword] = &[
    MetricKeyword {
        keyword: "water",
        slug: "water-intake",
        display_name: "Water Intake",
        description: "Fluid intake journal",
        tags: &["hydration"],
    },
    MetricKeyword {
        keyword: "medication",
        slug: "medication",
        display_name: "Medication",
        description: "Medication adherence journal",
        tags: &["adherence"],
    },
    MetricKeyword {
        keyword: "mood",
        slug: "mood",
        display_name: "Mood",
        description: "Mood self-rating journal",
        tags: &["wellbeing"],
    },
    MetricKeyword {
        keyword: "sleep",
        slug: "sleep",
        display_name: "Sleep",
        description: "Sleep duration and quality journal",
        tags: &["wellbeing", "rest"],
    },
    MetricKeyword {
        keyword: "exercise",
        slug: "exercise",
        display_name: "Exercise",
        description: "Physical activity journal",
        tags: &["activity"],
    },
    MetricKeyword {
        keyword: "blood pressure",
        slug: "blood-pressure",
        display_name: "Blood Pressure",
        description: "Blood pressure readings",
        tags: &["vitals"],
    },
    MetricKeyword {
        keyword: "weight",
        slug: "weight",
        display_name: "Weight",
        description: "Body weight journal",
        tags: &["vitals"],
    },
    MetricKeyword {
        keyword: "steps",
        slug: "steps",
        display_name: "Steps",
        description: "Daily step count journal",
        tags: &["activity"],
    },
];

/// Unit aliases, scanned in order; the second element is the canonical unit.
pub(crate) const UNIT_ALIASES: &[(&str, &str)] = &[
    ("ml", "ml"),
    ("milliliters", "ml"),
    ("millilitres", "ml"),
    ("liters", "l"),
    ("litres", "l"),
    ("oz", "oz"),
    ("ounces", "oz"),
    ("cups", "cups"),
    ("glasses", "glasses"),
    ("mg", "mg"),
    ("milligrams", "mg"),
    ("kg", "kg"),
    ("kilograms", "kg"),
    ("lbs", "lbs"),
    ("pounds", "lbs"),
    ("hours", "hours"),
    ("hrs", "hours"),
    ("minutes", "minutes"),
    ("mins", "minutes"),
    ("mmhg", "mmHg"),
    ("steps", "steps"),
];

pub(crate) const VOLUME_UNITS: &[&str] = &["ml", "l", "oz", "cups", "glasses"];

pub(crate) const WEIGHT_UNITS: &[&str] = &["kg", "lbs"];

/// Schedule phrases, most specific first ("twice daily" must win over
/// "daily"). The second element is the cron-like expression.
pub(crate) const SCHEDULE_PHRASES: &[(&str, &str)] = &[
    ("three times a day", "0 8,14,20 * * *"),
    ("three times daily", "0 8,14,20 * * *"),
    ("twice daily", super::TWICE_DAILY),
    ("twice a day", super::TWICE_DAILY),
    ("two times a day", super::TWICE_DAILY),
    ("every morning", "0 8 * * *"),
    ("each morning", "0 8 * * *"),
    ("every evening", "0 20 * * *"),
    ("every night", "0 21 * * *"),
    ("at bedtime", "0 21 * * *"),
    ("nightly", "0 21 * * *"),
    ("every hour", "0 * * * *"),
    ("hourly", "0 * * * *"),
    ("once a week", "0 9 * * 1"),
    ("weekly", "0 9 * * 1"),
    ("once a day", "0 9 * * *"),
    ("once daily", "0 9 * * *"),
    ("daily", "0 9 * * *"),
];

pub(crate) const TRACKING_VOCAB: &[&str] =
    &["track", "log", "record", "monitor", "journal", "measure"];

pub(crate) const SCHEDULE_VOCAB: &[&str] = &[
    "remind", "reminder", "daily", "weekly", "hourly", "every", "schedule",
];

pub(crate) const REQUIREMENT_VOCAB: &[&str] =
    &["required", "mandatory", "optional", "must", "if available"];

pub(crate) const ESCALATION_VOCAB: &[&str] = &[
    "escalate",
    "escalation",
    "caregiver",
    "care giver",
    "alert",
    "notify",
    "urgent",
];

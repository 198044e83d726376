use serde::{Deserialize, Serialize};

/// Observed behaviour of a contact since a source message was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBehavior {
    pub contact_id: i64,
    /// Any tracked link click since the source send.
    pub clicked_links: bool,
    /// Any eligibility questionnaire answered since the source send.
    pub answered_health_questions: bool,
    /// The latest questionnaire reported medical conditions.
    pub has_medical_conditions: bool,
    #[serde(default)]
    pub last_click_date: Option<String>,
    #[serde(default)]
    pub last_eligibility_date: Option<String>,
}

impl ContactBehavior {
    #[must_use]
    pub fn new(contact_id: i64) -> Self {
        Self {
            contact_id,
            ..Self::default()
        }
    }
}

/// The four behaviour-derived follow-up classes, most engaged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupTier {
    /// Answered the health questionnaire and reported conditions.
    HqWithYes,
    /// Answered the health questionnaire, no conditions reported.
    HqNoYes,
    /// Clicked a link but never answered the questionnaire.
    ClickedNoHq,
    /// Neither clicked nor answered.
    Cold,
}

impl FollowupTier {
    /// Classify a behaviour snapshot. Questionnaire answers outrank
    /// clicks; the tiers are mutually exclusive.
    #[must_use]
    pub fn classify(behavior: &ContactBehavior) -> Self {
        if behavior.answered_health_questions {
            if behavior.has_medical_conditions {
                Self::HqWithYes
            } else {
                Self::HqNoYes
            }
        } else if behavior.clicked_links {
            Self::ClickedNoHq
        } else {
            Self::Cold
        }
    }

    #[must_use]
    pub fn email_type(self) -> &'static str {
        match self {
            Self::HqWithYes => "followup_4_hq_with_yes",
            Self::HqNoYes => "followup_3_hq_no_yes",
            Self::ClickedNoHq => "followup_2_clicked_no_hq",
            Self::Cold => "followup_1_cold",
        }
    }

    /// Lower is more important.
    #[must_use]
    pub fn priority(self) -> i64 {
        match self {
            Self::HqWithYes => 1,
            Self::HqNoYes => 2,
            Self::ClickedNoHq => 3,
            Self::Cold => 4,
        }
    }

    #[must_use]
    pub fn default_email_template(self) -> &'static str {
        match self {
            Self::HqWithYes => "followup_hq_with_conditions_template",
            Self::HqNoYes => "followup_hq_no_conditions_template",
            Self::ClickedNoHq => "followup_clicked_template",
            Self::Cold => "followup_cold_template",
        }
    }
}

impl std::fmt::Display for FollowupTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.email_type())
    }
}

/// Whether eligibility-event metadata indicates reported medical
/// conditions: an explicit `has_medical_conditions` flag, a positive
/// `main_questions_yes_count`, or any truthy key whose name contains
/// `condition`.
#[must_use]
pub fn metadata_indicates_conditions(metadata: &serde_json::Value) -> bool {
    let Some(object) = metadata.as_object() else {
        return false;
    };

    if object
        .get("has_medical_conditions")
        .is_some_and(is_truthy)
    {
        return true;
    }

    if object
        .get("main_questions_yes_count")
        .and_then(serde_json::Value::as_f64)
        .is_some_and(|count| count > 0.0)
    {
        return true;
    }

    object
        .iter()
        .any(|(key, value)| key.to_lowercase().contains("condition") && is_truthy(value))
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

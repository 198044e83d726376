use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named campaign behaviour profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignType {
    pub name: String,
    /// Whether sends for this campaign honour state exclusion windows.
    pub respect_exclusion_windows: bool,
    /// Whether sent messages from this campaign feed the follow-up pass.
    pub enable_followups: bool,
    /// Offset from the trigger date to the send date.
    pub days_before_event: i64,
    /// Whether the campaign targets the whole population or only explicit
    /// memberships. Scheduling itself is membership-driven; this flag is
    /// consumed by targeting tooling.
    pub target_all_contacts: bool,
    /// Lower is more important.
    pub priority: i64,
    pub active: bool,
}

/// A concrete realisation of a [`CampaignType`] with its own templates,
/// activity bounds, and opaque metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignInstance {
    pub id: i64,
    pub campaign_type: String,
    pub instance_name: String,
    #[serde(default)]
    pub email_template: Option<String>,
    #[serde(default)]
    pub sms_template: Option<String>,
    /// `None` means active since forever.
    #[serde(default)]
    pub active_start_date: Option<NaiveDate>,
    /// `None` means active indefinitely.
    #[serde(default)]
    pub active_end_date: Option<NaiveDate>,
    /// Opaque JSON metadata; the follow-up pass reads per-tier template
    /// overrides out of a `followup_templates` object.
    #[serde(default)]
    pub metadata: Option<String>,
}

impl CampaignInstance {
    /// Whether `date` falls inside the instance's activity bounds.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.active_start_date.is_none_or(|start| start <= date)
            && self.active_end_date.is_none_or(|end| end >= date)
    }

    /// Template override for a follow-up email type from this instance's
    /// metadata. See [`followup_template_override`].
    #[must_use]
    pub fn followup_template_override(
        &self,
        followup_type: &str,
    ) -> Option<(Option<String>, Option<String>)> {
        followup_template_override(self.metadata.as_deref()?, followup_type)
    }
}

/// Template override for a follow-up email type, from campaign-instance
/// metadata shaped as
/// `{"followup_templates": {"<type>": {"email": ..., "sms": ...}}}`.
///
/// Returns `(email, sms)`; each side is `None` when the entry does not
/// override it. Returns `None` when there is no entry for the type or the
/// metadata is unparseable.
#[must_use]
pub fn followup_template_override(
    metadata: &str,
    followup_type: &str,
) -> Option<(Option<String>, Option<String>)> {
    let metadata: serde_json::Value = serde_json::from_str(metadata).ok()?;
    let entry = metadata.get("followup_templates")?.get(followup_type)?;
    let email = entry.get("email").and_then(|v| v.as_str()).map(str::to_owned);
    let sms = entry.get("sms").and_then(|v| v.as_str()).map(str::to_owned);
    Some((email, sms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(metadata: Option<&str>) -> CampaignInstance {
        CampaignInstance {
            id: 1,
            campaign_type: "rate_increase".into(),
            instance_name: "rate_increase_q1".into(),
            email_template: Some("rate_increase_v1".into()),
            sms_template: None,
            active_start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            active_end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            metadata: metadata.map(str::to_owned),
        }
    }

    #[test]
    fn activity_bounds_are_inclusive() {
        let instance = instance(None);
        assert!(instance.is_active_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(instance.is_active_on(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(!instance.is_active_on(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert!(!instance.is_active_on(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
    }

    #[test]
    fn open_ended_bounds() {
        let mut open = instance(None);
        open.active_start_date = None;
        open.active_end_date = None;
        assert!(open.is_active_on(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()));
        assert!(open.is_active_on(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()));
    }

    #[test]
    fn followup_override_present() {
        let metadata = r#"{
            "followup_templates": {
                "followup_4_hq_with_yes": {"email": "ri_hq_yes", "sms": "ri_hq_yes_sms"}
            }
        }"#;
        let instance = instance(Some(metadata));
        let (email, sms) = instance
            .followup_template_override("followup_4_hq_with_yes")
            .unwrap();
        assert_eq!(email.as_deref(), Some("ri_hq_yes"));
        assert_eq!(sms.as_deref(), Some("ri_hq_yes_sms"));
    }

    #[test]
    fn followup_override_missing_tier() {
        let metadata = r#"{"followup_templates": {"followup_1_cold": {"email": "x"}}}"#;
        let instance = instance(Some(metadata));
        assert!(instance
            .followup_template_override("followup_2_clicked_no_hq")
            .is_none());
    }

    #[test]
    fn followup_override_bad_metadata() {
        assert!(instance(Some("not json"))
            .followup_template_override("followup_1_cold")
            .is_none());
        assert!(instance(None)
            .followup_template_override("followup_1_cold")
            .is_none());
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A contact eligible for outbound scheduling.
///
/// Storage pre-filters to rows with non-empty `email`, `state`, and
/// `zip_code`; the two anchor dates remain optional and a missing or
/// malformed stored date surfaces here as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Stable storage identifier.
    pub id: i64,
    pub email: String,
    /// Two-letter state code (e.g. `"CA"`).
    pub state: String,
    pub zip_code: String,
    /// Birth date; anchors birthday anniversaries and birthday windows.
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Date the contact's policy became active; anchors effective-date
    /// anniversaries and effective-date windows.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

//! Heartbeat ping classification
//!
//! Maps one raw ping to a `(survey_id, submission_date, status)` key.
//! Classification is total: absent or oddly-typed fields fall back to
//! defaults and never produce an error.

use serde_json::Value;
use std::fmt;

/// Placeholder used for absent survey ids, dates and statuses
pub const UNKNOWN: &str = "unknown";

/// Separates the survey id from its per-installation suffix
const SURVEY_SUFFIX_DELIMITER: &str = "::";

/// Lifecycle state of one heartbeat interaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Engaged,
    /// Vote with its score rendered verbatim; `None` renders as `?`
    Voted(Option<String>),
    Expired,
    Closed,
    Offered,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Engaged => f.write_str("engaged"),
            Status::Voted(Some(score)) => write!(f, "voted{}", score),
            Status::Voted(None) => f.write_str("voted?"),
            Status::Expired => f.write_str("expired"),
            Status::Closed => f.write_str("closed"),
            Status::Offered => f.write_str("offered"),
            Status::Unknown => f.write_str(UNKNOWN),
        }
    }
}

/// Grouping key for counting
///
/// Ordered survey first, then date, then status.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassificationKey {
    pub survey_id: String,
    pub submission_date: String,
    pub status: String,
}

impl ClassificationKey {
    pub fn new(
        survey_id: impl Into<String>,
        submission_date: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            survey_id: survey_id.into(),
            submission_date: submission_date.into(),
            status: status.into(),
        }
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.survey_id, self.submission_date, self.status
        )
    }
}

/// Classify one ping
pub fn classify(ping: &Value) -> ClassificationKey {
    let survey_id = lookup(ping, &["payload", "surveyId"])
        .and_then(render_scalar)
        .map(|id| strip_installation_suffix(&id).to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let submission_date = lookup(ping, &["meta", "submissionDate"])
        .and_then(render_scalar)
        .filter(|date| !date.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    ClassificationKey {
        survey_id,
        submission_date,
        status: classify_status(ping).to_string(),
    }
}

/// Determine the lifecycle status; the first matching timestamp wins
pub fn classify_status(ping: &Value) -> Status {
    let payload = match ping.get("payload") {
        Some(payload) if is_truthy(payload) => payload,
        _ => return Status::Unknown,
    };

    let has = |field: &str| payload.get(field).is_some_and(is_truthy);

    if has("engagedTS") {
        Status::Engaged
    } else if has("votedTS") {
        Status::Voted(payload.get("score").and_then(render_scalar))
    } else if has("expiredTS") {
        Status::Expired
    } else if has("closedTS") {
        Status::Closed
    } else if has("offeredTS") {
        Status::Offered
    } else {
        Status::Unknown
    }
}

/// Keep only the survey id before the first `::`
pub fn strip_installation_suffix(survey_id: &str) -> &str {
    survey_id
        .split_once(SURVEY_SUFFIX_DELIMITER)
        .map_or(survey_id, |(id, _)| id)
}

/// Falsy: null, false, zero, empty string, empty array, empty object
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Walk nested objects; any missing or non-object step yields `None`
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Render a present field as key text; null counts as absent
fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

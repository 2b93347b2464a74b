use chrono::{NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::SubmitError;
use crate::filename::derive_filename;

/// Header row of every record file.
pub const COLUMNS: [&str; 10] = [
    "timestamp",
    "name",
    "email",
    "roll",
    "birthdate",
    "registration",
    "stream",
    "session",
    "year",
    "course",
];

/// Submitted fields, in column order. Every one of them is required.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "name",
    "email",
    "roll",
    "birthdate",
    "registration",
    "stream",
    "session",
    "year",
    "course",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A profile that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSubmission {
    pub name: String,
    pub email: String,
    pub roll: String,
    pub birthdate: String,
    pub registration: String,
    pub stream: String,
    pub session: String,
    pub year: String,
    pub course: String,
}

impl ProfileSubmission {
    /// Parse a raw request body. Anything that is not a JSON object is
    /// treated as an object with no fields, so it fails the required-field
    /// check like any other incomplete form.
    pub fn from_body(body: &[u8]) -> Result<Self, SubmitError> {
        let value = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, SubmitError> {
        let mut fields: Vec<Option<String>> = REQUIRED_FIELDS
            .iter()
            .map(|key| value.get(key).and_then(field_text))
            .collect();

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .zip(&fields)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(SubmitError::MissingFields(missing));
        }

        let mut take = |i: usize| fields[i].take().unwrap_or_default();
        let submission = Self {
            name: take(0),
            email: take(1),
            roll: take(2),
            birthdate: take(3),
            registration: take(4),
            stream: take(5),
            session: take(6),
            year: take(7),
            course: take(8),
        };
        submission.check_session_order()?;
        Ok(submission)
    }

    /// Rejects sessions whose end year is not after the start year. Sessions
    /// that are not two integers are let through unchecked.
    fn check_session_order(&self) -> Result<(), SubmitError> {
        let parts: Vec<&str> = self.session.split('-').collect();
        let [start, end] = parts.as_slice() else {
            return Ok(());
        };
        match (parse_year(start), parse_year(end)) {
            (Ok(start), Ok(end)) if end <= start => Err(SubmitError::SessionOrder),
            _ => Ok(()),
        }
    }

    pub fn filename(&self) -> String {
        derive_filename(&self.stream, &self.year, &self.session)
    }

    /// Stamp the submission with the current UTC time.
    pub fn into_row(self) -> RecordRow {
        RecordRow::new(Utc::now().naive_utc(), self)
    }
}

/// Integer parse that also takes digit-group underscores such as `2_025`.
fn parse_year(text: &str) -> Result<i128, std::num::ParseIntError> {
    let text = text.trim();
    let grouped = text.contains('_')
        && !text.starts_with('_')
        && !text.ends_with('_')
        && !text.contains("__");
    if grouped {
        text.replace('_', "").parse()
    } else {
        text.parse()
    }
}

/// Empty strings, zero and non-scalar values all count as missing.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// One line of a record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub timestamp: NaiveDateTime,
    pub profile: ProfileSubmission,
}

impl RecordRow {
    pub fn new(timestamp: NaiveDateTime, profile: ProfileSubmission) -> Self {
        Self { timestamp, profile }
    }

    pub fn fields(&self) -> [String; 10] {
        let p = &self.profile;
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            p.name.clone(),
            p.email.clone(),
            p.roll.clone(),
            p.birthdate.clone(),
            p.registration.clone(),
            p.stream.clone(),
            p.session.clone(),
            p.year.clone(),
            p.course.clone(),
        ]
    }
}

/// Parse a timestamp column written by [`RecordRow::fields`].
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Accident,
    #[serde(rename = "Mechanical Problem")]
    MechanicalProblem,
    #[serde(rename = "Fuel Issue")]
    FuelIssue,
    #[serde(rename = "Flat Tire")]
    FlatTire,
    Other,
}

impl IssueKind {
    pub const ALL: [IssueKind; 5] = [
        IssueKind::Accident,
        IssueKind::MechanicalProblem,
        IssueKind::FuelIssue,
        IssueKind::FlatTire,
        IssueKind::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::Accident => "Accident",
            IssueKind::MechanicalProblem => "Mechanical Problem",
            IssueKind::FuelIssue => "Fuel Issue",
            IssueKind::FlatTire => "Flat Tire",
            IssueKind::Other => "Other",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IssueKind {
    type Err = ReportError;

    /// Accepts the label as well as kebab or snake case ("flat-tire", "flat_tire").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_ascii_lowercase();
        IssueKind::ALL
            .into_iter()
            .find(|kind| kind.label().replace(' ', "").to_ascii_lowercase() == wanted)
            .ok_or_else(|| ReportError::UnknownIssue(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("Please select the nature of the issue.")]
    UnknownIssue(String),
    #[error("Please add a note.")]
    MissingNote,
}

/// An incident filed by a renter during a rental.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentReport {
    pub renter_id: i64,
    pub nature_of_issue: IssueKind,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub note: String,
    pub emergency: bool,
}

impl IncidentReport {
    pub fn new(renter_id: i64, nature_of_issue: IssueKind, date: NaiveDate, time: NaiveTime, note: &str, emergency: bool) -> Result<Self, ReportError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(ReportError::MissingNote);
        }

        Ok(Self {
            renter_id,
            nature_of_issue,
            date,
            time,
            note: note.to_string(),
            emergency,
        })
    }
}

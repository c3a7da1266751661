//! File and job status enums with their stored string forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a registered import file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportFileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImportFileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFileStatus::Pending => "pending",
            ImportFileStatus::Processing => "processing",
            ImportFileStatus::Completed => "completed",
            ImportFileStatus::Failed => "failed",
        }
    }
}

impl FromStr for ImportFileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportFileStatus::Pending),
            "processing" => Ok(ImportFileStatus::Processing),
            "completed" => Ok(ImportFileStatus::Completed),
            "failed" => Ok(ImportFileStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ImportFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one import attempt.
///
/// Transitions only move forward: `Pending -> Running -> Completed | Failed`.
/// A retry is a new job, never a rewind of an old one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportJobStatus::Pending => "pending",
            ImportJobStatus::Running => "running",
            ImportJobStatus::Completed => "completed",
            ImportJobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobStatus::Completed | ImportJobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: ImportJobStatus) -> bool {
        use ImportJobStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Completed) | (Running, Failed)
        )
    }
}

impl FromStr for ImportJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportJobStatus::Pending),
            "running" => Ok(ImportJobStatus::Running),
            "completed" => Ok(ImportJobStatus::Completed),
            "failed" => Ok(ImportJobStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of source a file carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Recording office instruments.
    Records,
    /// Appraiser or municipal parcel rolls.
    PropertyAppraiser,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Records => "records",
            DataType::PropertyAppraiser => "property_appraiser",
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "records" => Ok(DataType::Records),
            "property_appraiser" => Ok(DataType::PropertyAppraiser),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_transitions_are_monotonic() {
        use ImportJobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ImportJobStatus::Completed.is_terminal());
        assert!(ImportJobStatus::Failed.is_terminal());
        assert!(!ImportJobStatus::Running.is_terminal());
    }

    #[test]
    fn test_round_trip_strings() {
        for s in ["pending", "processing", "completed", "failed"] {
            assert_eq!(s.parse::<ImportFileStatus>().unwrap().as_str(), s);
        }
        for s in ["pending", "running", "completed", "failed"] {
            assert_eq!(s.parse::<ImportJobStatus>().unwrap().as_str(), s);
        }
        assert!("ignored".parse::<ImportJobStatus>().is_err());
        for s in ["records", "property_appraiser"] {
            assert_eq!(s.parse::<DataType>().unwrap().as_str(), s);
        }
    }
}

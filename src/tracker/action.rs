use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete action label produced by the landmark classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "Hands Up")]
    HandsUp,
    #[serde(rename = "Hands Crossed")]
    HandsCrossed,
    #[serde(rename = "T-Pose")]
    TPose,
    #[serde(rename = "One Hand Raised (Left)")]
    OneHandLeft,
    #[serde(rename = "One Hand Raised (Right)")]
    OneHandRight,
    #[serde(rename = "Sit")]
    Sit,
    #[serde(rename = "Standing")]
    Standing,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::HandsUp,
        Action::HandsCrossed,
        Action::TPose,
        Action::OneHandLeft,
        Action::OneHandRight,
        Action::Sit,
        Action::Standing,
        Action::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::HandsUp => "Hands Up",
            Action::HandsCrossed => "Hands Crossed",
            Action::TPose => "T-Pose",
            Action::OneHandLeft => "One Hand Raised (Left)",
            Action::OneHandRight => "One Hand Raised (Right)",
            Action::Sit => "Sit",
            Action::Standing => "Standing",
            Action::Unknown => "Unknown",
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != Action::Unknown
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(pub String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action label `{}`", self.0)
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseActionError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.label().parse::<Action>().unwrap(), action);
        }
        assert!("Jumping".parse::<Action>().is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Action::OneHandLeft).unwrap();
        assert_eq!(json, "\"One Hand Raised (Left)\"");
    }
}

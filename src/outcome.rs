//! Terminal outcome codes reported by the perception subsystem.
//!
//! These codes mirror the cloud anchor service's state enumeration and
//! serialize as `SCREAMING_SNAKE_CASE` strings (e.g., `"ERROR_INTERNAL"`).
//! The set is closed: every hosting or resolving operation settles with
//! exactly one of these values, and [`description()`](CloudAnchorState::description)
//! covers all of them. Adding a variant without a mapping entry is a compile
//! error, not a silent default.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a cloud anchor operation as reported by the perception subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudAnchorState {
    /// No state has been reported yet.
    Unspecified,
    /// The operation completed and the anchor is usable.
    Success,
    /// The service hit an internal error.
    ErrorInternal,
    /// The operation is still running. Never a terminal outcome; a gateway
    /// that delivers it as one is misbehaving.
    TaskInProgress,
    ErrorNotAuthorized,
    ErrorResourceExhausted,
    ErrorServiceUnavailable,
    ErrorHostingDatasetProcessingFailed,
    ErrorCloudIdNotFound,
    ErrorResolvingSdkVersionTooNew,
    ErrorResolvingSdkVersionTooOld,
    ErrorResolvingLocalizationNoMatch,
}

impl CloudAnchorState {
    /// Every value of the enumeration, in declaration order.
    pub const ALL: [CloudAnchorState; 12] = [
        CloudAnchorState::Unspecified,
        CloudAnchorState::Success,
        CloudAnchorState::ErrorInternal,
        CloudAnchorState::TaskInProgress,
        CloudAnchorState::ErrorNotAuthorized,
        CloudAnchorState::ErrorResourceExhausted,
        CloudAnchorState::ErrorServiceUnavailable,
        CloudAnchorState::ErrorHostingDatasetProcessingFailed,
        CloudAnchorState::ErrorCloudIdNotFound,
        CloudAnchorState::ErrorResolvingSdkVersionTooNew,
        CloudAnchorState::ErrorResolvingSdkVersionTooOld,
        CloudAnchorState::ErrorResolvingLocalizationNoMatch,
    ];

    /// Returns a human-readable description of this state, suitable for the
    /// session's display message. Total over the enumeration.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unspecified => "No outcome was reported for the anchor operation.",
            Self::Success => "The anchor operation completed successfully.",
            Self::ErrorInternal => {
                "The cloud anchor service hit an internal error. Try the operation again."
            }
            Self::TaskInProgress => "The anchor operation is still in progress.",
            Self::ErrorNotAuthorized => {
                "The application is not authorized to use the cloud anchor service. \
                 Check the API key and its restrictions."
            }
            Self::ErrorResourceExhausted => {
                "The cloud anchor service quota for this application is exhausted. \
                 Try again later."
            }
            Self::ErrorServiceUnavailable => {
                "The cloud anchor service is temporarily unavailable. Try again in a few moments."
            }
            Self::ErrorHostingDatasetProcessingFailed => {
                "The service could not process the visual data for this anchor. \
                 Host again from a viewpoint with more visual features."
            }
            Self::ErrorCloudIdNotFound => {
                "No hosted anchor exists for the given cloud anchor id. \
                 It may have expired or the id may be wrong."
            }
            Self::ErrorResolvingSdkVersionTooNew => {
                "The anchor was hosted with an older SDK than this client and cannot be resolved."
            }
            Self::ErrorResolvingSdkVersionTooOld => {
                "The anchor was hosted with a newer SDK than this client. \
                 Upgrade the SDK to resolve it."
            }
            Self::ErrorResolvingLocalizationNoMatch => {
                "The current view does not match the hosted anchor's surroundings. \
                 Move to the hosted location and look at the same scene."
            }
        }
    }

    /// Returns `true` if this state reports a completed, usable anchor.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for states that settle an operation.
    /// [`TaskInProgress`](Self::TaskInProgress) is the only non-terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::TaskInProgress)
    }
}

impl fmt::Display for CloudAnchorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_a_nonempty_description() {
        for state in CloudAnchorState::ALL {
            assert!(
                !state.description().is_empty(),
                "{state:?} must map to a display string"
            );
        }
    }

    #[test]
    fn all_covers_every_variant_exactly_once() {
        for (i, a) in CloudAnchorState::ALL.iter().enumerate() {
            for b in &CloudAnchorState::ALL[i + 1..] {
                assert_ne!(a, b, "ALL contains a duplicate");
            }
        }
    }

    #[test]
    fn success_is_the_only_success() {
        for state in CloudAnchorState::ALL {
            assert_eq!(state.is_success(), state == CloudAnchorState::Success);
        }
    }

    #[test]
    fn task_in_progress_is_the_only_non_terminal_state() {
        for state in CloudAnchorState::ALL {
            assert_eq!(
                state.is_terminal(),
                state != CloudAnchorState::TaskInProgress
            );
        }
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&CloudAnchorState::ErrorCloudIdNotFound).unwrap();
        assert_eq!(json, "\"ERROR_CLOUD_ID_NOT_FOUND\"");

        let state: CloudAnchorState = serde_json::from_str("\"SUCCESS\"").unwrap();
        assert_eq!(state, CloudAnchorState::Success);
    }
}

//! Point requests and their status lifecycle.
//!
//! A request is created `Pending` by a teacher and reviewed by a
//! leader. `Pending` is the only non-terminal state: once a request is
//! `Approved` or `Rejected` no further transition is defined.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{HouseId, RequestId, Timestamp, UserId};

/// Review status of a point request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// The stored string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Validate a transition from `self` to `next`.
    ///
    /// Transitions are monotonic: only `Pending -> Approved` and
    /// `Pending -> Rejected` are allowed.
    pub fn transition_to(self, next: RequestStatus) -> Result<RequestStatus, CoreError> {
        match (self, next) {
            (RequestStatus::Pending, RequestStatus::Approved)
            | (RequestStatus::Pending, RequestStatus::Rejected) => Ok(next),
            (from, to) => Err(CoreError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed point award awaiting (or past) leader review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRequest {
    pub id: RequestId,
    pub teacher_id: UserId,
    pub house_id: HouseId,
    pub points: i64,
    pub reason: String,
    pub status: RequestStatus,
    pub submitted_at: Timestamp,
    pub reviewed_by: Option<UserId>,

    // Display joins populated by the gateway for list views.
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub house_name: Option<String>,
    #[serde(default)]
    pub reviewed_by_name: Option<String>,
}

//! Command payloads and their local validation rules.
//!
//! Commands are validated before the round-trip so obvious mistakes
//! (zero points, empty reason) never hit the gateway. The gateway's
//! policy layer remains the authority.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::HouseId;

/// Payload for submitting a point request or adding manual points.
///
/// Both surfaces carry the same fields; manual points skip the review
/// queue server-side but the client-side rules are identical.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PointsInput {
    #[validate(length(min = 1, message = "A house must be selected"))]
    pub house_id: HouseId,

    #[validate(range(min = 1, message = "Points must be at least 1"))]
    pub points: i64,

    #[validate(length(min = 1, message = "A reason is required"))]
    pub reason: String,
}

impl PointsInput {
    pub fn new(house_id: impl Into<HouseId>, points: i64, reason: impl Into<String>) -> Self {
        Self {
            house_id: house_id.into(),
            points,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_passes() {
        assert!(PointsInput::new("kotuku", 10, "Excellent work in class").validate().is_ok());
    }

    #[test]
    fn zero_or_negative_points_rejected() {
        assert!(PointsInput::new("kotuku", 0, "reason").validate().is_err());
        assert!(PointsInput::new("kotuku", -5, "reason").validate().is_err());
    }

    #[test]
    fn empty_reason_rejected() {
        assert!(PointsInput::new("kotuku", 10, "").validate().is_err());
    }

    #[test]
    fn empty_house_rejected() {
        assert!(PointsInput::new("", 10, "reason").validate().is_err());
    }
}

//! Command surfaces: submit, review, manual points, admin edits.
//!
//! Every command is one round-trip: validate locally, issue the write,
//! then refetch the affected collection in full. There is no
//! optimistic merge; consistency is deferred to the refetch, which is
//! simpler and no less correct given the gateway owns all conflict
//! resolution. Failures carry the gateway's message verbatim.

use houseboard_core::allowed_email::AllowedEmail;
use houseboard_core::types::{RequestId, UserId};
use houseboard_core::validation::PointsInput;
use houseboard_core::{House, PointRequest, Profile, Role};
use houseboard_gateway::Gateway;
use validator::Validate;

use crate::error::AppError;

fn validated(input: &PointsInput) -> Result<(), AppError> {
    input.validate().map_err(|e| AppError::from_validation(&e))
}

/// Teacher surface: submit a new point request.
///
/// Returns the refreshed request list so "my requests" shows the new
/// `Pending` row immediately.
pub async fn submit_point_request(
    gateway: &dyn Gateway,
    teacher_id: UserId,
    input: &PointsInput,
) -> Result<Vec<PointRequest>, AppError> {
    validated(input)?;
    gateway.insert_point_request(teacher_id, input).await?;
    Ok(gateway.point_requests().await?)
}

/// Leader surface: approve a pending request.
///
/// The status flip and the house increment happen atomically in the
/// gateway's procedure; this side only sees success or failure.
pub async fn approve_request(
    gateway: &dyn Gateway,
    request_id: RequestId,
) -> Result<Vec<PointRequest>, AppError> {
    gateway.approve_request(request_id).await?;
    Ok(gateway.point_requests().await?)
}

/// Leader surface: reject a pending request.
///
/// A plain row update stamping the reviewer; rejection has no point
/// effect so there is no procedure to call.
pub async fn reject_request(
    gateway: &dyn Gateway,
    request_id: RequestId,
    reviewer_id: UserId,
) -> Result<Vec<PointRequest>, AppError> {
    gateway.reject_request(request_id, reviewer_id).await?;
    Ok(gateway.point_requests().await?)
}

/// Leader surface: award points directly (large events like Sports
/// Day), bypassing the review queue.
pub async fn add_manual_points(
    gateway: &dyn Gateway,
    input: &PointsInput,
) -> Result<Vec<House>, AppError> {
    validated(input)?;
    gateway.add_manual_points(input).await?;
    Ok(gateway.houses().await?)
}

/// Admin surface: set a house's total directly.
pub async fn set_house_points(
    gateway: &dyn Gateway,
    house_id: &str,
    points: i64,
) -> Result<Vec<House>, AppError> {
    gateway.set_house_points(house_id, points).await?;
    Ok(gateway.houses().await?)
}

/// Admin surface: zero one house.
pub async fn reset_house_points(
    gateway: &dyn Gateway,
    house_id: &str,
) -> Result<Vec<House>, AppError> {
    set_house_points(gateway, house_id, 0).await
}

/// Admin surface: change a user's role.
pub async fn set_user_role(
    gateway: &dyn Gateway,
    profile_id: UserId,
    role: Role,
) -> Result<Vec<Profile>, AppError> {
    gateway.set_profile_role(profile_id, role).await?;
    Ok(gateway.profiles().await?)
}

/// Admin surface: add or update an allow-list entry.
pub async fn upsert_allowed_email(
    gateway: &dyn Gateway,
    email: &str,
    role: Role,
    note: Option<&str>,
) -> Result<Vec<AllowedEmail>, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation(
            "Enter an email or domain (e.g. @aotea.school.nz)".to_string(),
        ));
    }
    gateway.upsert_allowed_email(&email, role, note).await?;
    Ok(gateway.allowed_emails().await?)
}

/// Admin surface: remove an allow-list entry.
pub async fn delete_allowed_email(
    gateway: &dyn Gateway,
    email: &str,
) -> Result<Vec<AllowedEmail>, AppError> {
    gateway.delete_allowed_email(email).await?;
    Ok(gateway.allowed_emails().await?)
}

/// Danger zone: wipe the project.
///
/// Deletes all requests, all profiles but the caller's, and zeroes
/// every house. The caller is expected to sign out afterwards.
pub async fn reset_project(gateway: &dyn Gateway) -> Result<(), AppError> {
    gateway.reset_project().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use assert_matches::assert_matches;
    use uuid::Uuid;

    use houseboard_core::RequestStatus;
    use houseboard_gateway::MemoryGateway;

    fn teacher() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: "Jan Teacher".to_string(),
            email: Some("jan@aotea.school.nz".to_string()),
            role: Role::Teacher,
        }
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_gateway() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let result =
            submit_point_request(gateway.as_ref(), Uuid::new_v4(), &PointsInput::new("kotuku", 0, ""))
                .await;
        assert_matches!(result, Err(AppError::Validation(_)));
        assert!(gateway.point_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_returns_the_refreshed_list_with_the_pending_row() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let teacher = teacher();
        gateway.seed_account(teacher.clone(), "jan@aotea.school.nz", "pw");

        let requests = submit_point_request(
            gateway.as_ref(),
            teacher.id,
            &PointsInput::new("kotuku", 10, "Excellent work in class"),
        )
        .await
        .unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Pending);
        assert_eq!(requests[0].teacher_name.as_deref(), Some("Jan Teacher"));
        assert_eq!(requests[0].house_name.as_deref(), Some("Kōtuku"));
    }

    #[tokio::test]
    async fn write_failure_applies_no_local_change() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let result = approve_request(gateway.as_ref(), Uuid::new_v4()).await;
        assert_matches!(result, Err(AppError::Gateway(_)));
        assert!(gateway.houses().await.unwrap().iter().all(|h| h.points == 0));
    }

    #[tokio::test]
    async fn set_and_reset_house_points_refetch_houses() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());

        let houses = set_house_points(gateway.as_ref(), "keruru", 120).await.unwrap();
        assert_eq!(houses.iter().find(|h| h.id == "keruru").unwrap().points, 120);

        let houses = reset_house_points(gateway.as_ref(), "keruru").await.unwrap();
        assert_eq!(houses.iter().find(|h| h.id == "keruru").unwrap().points, 0);
    }

    #[tokio::test]
    async fn role_change_round_trips_through_the_profile_list() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let profile = teacher();
        gateway.seed_account(profile.clone(), "jan@aotea.school.nz", "pw");

        let profiles = set_user_role(gateway.as_ref(), profile.id, Role::WhanauLeader)
            .await
            .unwrap();
        assert_eq!(profiles[0].role, Role::WhanauLeader);
    }

    #[tokio::test]
    async fn allow_list_entries_are_normalized_on_insert() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());

        let entries =
            upsert_allowed_email(gateway.as_ref(), "  Jan@Aotea.School.NZ ", Role::Teacher, None)
                .await
                .unwrap();
        assert_eq!(entries[0].email, "jan@aotea.school.nz");

        let entries = delete_allowed_email(gateway.as_ref(), "jan@aotea.school.nz")
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn blank_allow_list_entry_is_rejected_locally() {
        let gateway = Arc::new(MemoryGateway::with_default_houses());
        let result = upsert_allowed_email(gateway.as_ref(), "   ", Role::Student, None).await;
        assert_matches!(result, Err(AppError::Validation(_)));
    }
}

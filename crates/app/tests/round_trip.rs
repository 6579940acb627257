//! End-to-end flows over the in-memory gateway: the submit/review
//! round trip, the live leaderboard, identity resolution, and the
//! admin reset.

mod common;

use common::{points_of, seeded, DOMAIN, LEADER_EMAIL, TEACHER_EMAIL, PASSWORD};

use houseboard_app::{commands, LeaderboardView, SessionHolder, SessionState};
use houseboard_core::nav::{route_access, Route, RouteAccess};
use houseboard_core::validation::PointsInput;
use houseboard_core::RequestStatus;
use houseboard_gateway::Gateway;

#[tokio::test]
async fn submit_then_approve_increments_the_house_total() {
    let fixture = seeded();
    let gateway = fixture.gateway;

    // Teacher submits 10 points for kotuku.
    let requests = commands::submit_point_request(
        gateway.as_ref(),
        fixture.teacher.id,
        &PointsInput::new("kotuku", 10, "Science fair winners"),
    )
    .await
    .unwrap();

    let mine: Vec<_> = requests
        .iter()
        .filter(|r| r.teacher_id == fixture.teacher.id)
        .collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, RequestStatus::Pending);
    assert_eq!(points_of(&gateway, "kotuku").await, 0, "no points before review");

    // Leader signs in and approves.
    gateway.sign_in(LEADER_EMAIL, PASSWORD).await.unwrap();
    let requests = commands::approve_request(gateway.as_ref(), mine[0].id).await.unwrap();

    assert_eq!(requests[0].status, RequestStatus::Approved);
    assert_eq!(points_of(&gateway, "kotuku").await, 10, "approval adds exactly 10");
}

#[tokio::test]
async fn reject_stamps_the_reviewer_and_leaves_the_total_unchanged() {
    let fixture = seeded();
    let gateway = fixture.gateway;

    let requests = commands::submit_point_request(
        gateway.as_ref(),
        fixture.teacher.id,
        &PointsInput::new("kotuku", 10, "Line up nicely"),
    )
    .await
    .unwrap();
    let request_id = requests[0].id;

    let requests =
        commands::reject_request(gateway.as_ref(), request_id, fixture.leader.id)
            .await
            .unwrap();

    assert_eq!(requests[0].status, RequestStatus::Rejected);
    assert_eq!(requests[0].reviewed_by, Some(fixture.leader.id));
    assert_eq!(requests[0].reviewed_by_name.as_deref(), Some("Lea Leader"));
    assert_eq!(points_of(&gateway, "kotuku").await, 0);
}

#[tokio::test]
async fn manual_points_skip_the_queue_but_leave_an_audit_row() {
    let fixture = seeded();
    let gateway = fixture.gateway;
    gateway.sign_in(LEADER_EMAIL, PASSWORD).await.unwrap();

    let houses = commands::add_manual_points(
        gateway.as_ref(),
        &PointsInput::new("pukeko", 50, "Sports Day Winner"),
    )
    .await
    .unwrap();

    assert_eq!(houses.iter().find(|h| h.id == "pukeko").unwrap().points, 50);
    let requests = gateway.point_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, RequestStatus::Approved);
}

#[tokio::test]
async fn leaderboard_follows_approvals_live() {
    let fixture = seeded();
    let gateway = fixture.gateway;

    let view = LeaderboardView::start(gateway.clone()).await.unwrap();
    let mut standings = view.watch();
    assert_eq!(view.standings().max_points(), 1, "all zeroes floors the divisor");

    // An approval pushes a change event that reorders the board.
    let requests = commands::submit_point_request(
        gateway.as_ref(),
        fixture.teacher.id,
        &PointsInput::new("korimako", 25, "Kapa haka practice"),
    )
    .await
    .unwrap();
    gateway.sign_in(LEADER_EMAIL, PASSWORD).await.unwrap();
    commands::approve_request(gateway.as_ref(), requests[0].id).await.unwrap();

    standings.changed().await.unwrap();
    let snapshot = standings.borrow().clone();
    assert_eq!(snapshot.houses()[0].id, "korimako");
    assert_eq!(snapshot.houses()[0].points, 25);
    assert_eq!(snapshot.max_points(), 25);

    view.close();
}

#[tokio::test]
async fn identity_flow_gates_navigation() {
    let fixture = seeded();
    let gateway = fixture.gateway;

    let holder = SessionHolder::start(gateway.clone(), DOMAIN).await;
    assert_eq!(holder.state(), SessionState::Anonymous);
    assert_eq!(
        route_access(holder.state().role(), Route::Dashboard),
        RouteAccess::RedirectToLogin,
    );

    holder.sign_in(TEACHER_EMAIL, PASSWORD).await.unwrap();
    assert_eq!(
        route_access(holder.state().role(), Route::Dashboard),
        RouteAccess::Granted,
    );
    assert_eq!(
        route_access(holder.state().role(), Route::Admin),
        RouteAccess::RedirectToLogin,
    );
}

#[tokio::test]
async fn project_reset_zeroes_totals_and_clears_requests() {
    let fixture = seeded();
    let gateway = fixture.gateway;

    // Build up some state worth wiping.
    commands::set_house_points(gateway.as_ref(), "kotuku", 80).await.unwrap();
    commands::submit_point_request(
        gateway.as_ref(),
        fixture.teacher.id,
        &PointsInput::new("keruru", 5, "Tidy classroom"),
    )
    .await
    .unwrap();

    gateway.sign_in(common::ADMIN_EMAIL, PASSWORD).await.unwrap();
    commands::reset_project(gateway.as_ref()).await.unwrap();

    // The next loads observe the wiped state.
    let view = LeaderboardView::start(gateway.clone()).await.unwrap();
    assert!(view.standings().houses().iter().all(|h| h.points == 0));
    assert!(gateway.point_requests().await.unwrap().is_empty());

    let profiles = gateway.profiles().await.unwrap();
    assert_eq!(profiles.len(), 1, "only the caller's profile survives");
    assert_eq!(profiles[0].id, fixture.admin.id);
}

//! Role-gated navigation.
//!
//! Access is a single capability-set lookup keyed by role, computed
//! once at compile time. There is no state and the only failure mode
//! is a redirect to the login screen.

use crate::profile::Role;

/// The application's screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Public leaderboard.
    Leaderboard,
    /// Full-screen TV view of the leaderboard.
    Screen,
    /// Teacher dashboard: submit requests, view own submissions.
    Dashboard,
    /// Leader dashboard: approval queue, manual points.
    Leader,
    /// Admin dashboard: users, allow-list, house totals, danger zone.
    Admin,
    /// Sign-in screen.
    Login,
}

/// Routes visible to everyone, signed in or not.
const PUBLIC_ROUTES: &[Route] = &[Route::Leaderboard, Route::Screen, Route::Login];

const TEACHER_ROUTES: &[Route] =
    &[Route::Leaderboard, Route::Screen, Route::Login, Route::Dashboard];

const LEADER_ROUTES: &[Route] = &[
    Route::Leaderboard,
    Route::Screen,
    Route::Login,
    Route::Dashboard,
    Route::Leader,
];

const ADMIN_ROUTES: &[Route] = &[
    Route::Leaderboard,
    Route::Screen,
    Route::Login,
    Route::Dashboard,
    Route::Leader,
    Route::Admin,
];

/// The set of routes a role may see.
///
/// Students see only the public routes; each staff tier adds its own
/// screens on top of the tier below.
pub fn visible_routes(role: Role) -> &'static [Route] {
    match role {
        Role::Student => PUBLIC_ROUTES,
        Role::Teacher => TEACHER_ROUTES,
        Role::WhanauLeader => LEADER_ROUTES,
        Role::Admin => ADMIN_ROUTES,
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Granted,
    RedirectToLogin,
}

/// Guard a navigation attempt.
///
/// Anonymous visitors may reach public routes only; everyone else is
/// checked against their role's capability set. Under-privileged or
/// unauthenticated access redirects to login.
pub fn route_access(role: Option<Role>, route: Route) -> RouteAccess {
    let allowed = match role {
        Some(role) => visible_routes(role),
        None => PUBLIC_ROUTES,
    };
    if allowed.contains(&route) {
        RouteAccess::Granted
    } else {
        RouteAccess::RedirectToLogin
    }
}

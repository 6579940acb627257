//! Application layer over the gateway.
//!
//! Three pieces: the live leaderboard (a ranked aggregation view kept
//! sorted under the realtime change feed), the session/identity
//! holder, and the command surfaces (submit, review, admin edits).
//! Every piece takes an `Arc<dyn Gateway>` so tests can run the whole
//! layer against the in-memory gateway.

pub mod commands;
pub mod error;
pub mod leaderboard;
pub mod session;

pub use error::AppError;
pub use leaderboard::{HousePatch, LeaderboardView, Standings};
pub use session::{SessionHolder, SessionState};

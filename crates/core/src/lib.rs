//! Domain types and pure logic for the house points competition.
//!
//! This crate has no I/O. It defines the entities the rest of the
//! workspace moves around (houses, profiles, point requests, the
//! admin allow-list), the role capability table used for navigation,
//! and the validation rules applied to command payloads before they
//! ever reach the remote gateway.

pub mod allowed_email;
pub mod error;
pub mod house;
pub mod nav;
pub mod profile;
pub mod request;
pub mod types;
pub mod validation;

pub use error::CoreError;
pub use house::{House, HouseColor};
pub use profile::{Profile, Role};
pub use request::{PointRequest, RequestStatus};

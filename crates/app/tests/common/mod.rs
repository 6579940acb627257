//! Shared fixtures for the application-layer integration tests.
//!
//! Mirrors a freshly provisioned deployment: the four competition
//! houses at zero points and one account per staff role, all on the
//! school domain.

use std::sync::Arc;

use uuid::Uuid;

use houseboard_core::{Profile, Role};
use houseboard_gateway::MemoryGateway;

pub const DOMAIN: &str = "@aotea.school.nz";

pub const TEACHER_EMAIL: &str = "jan.teacher@aotea.school.nz";
pub const LEADER_EMAIL: &str = "lea.leader@aotea.school.nz";
pub const ADMIN_EMAIL: &str = "ari.admin@aotea.school.nz";
pub const PASSWORD: &str = "correct-horse";

pub struct Fixture {
    pub gateway: Arc<MemoryGateway>,
    pub teacher: Profile,
    pub leader: Profile,
    pub admin: Profile,
}

fn profile(full_name: &str, email: &str, role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: Some(email.to_string()),
        role,
    }
}

/// A seeded gateway with the default houses and one account per role.
pub fn seeded() -> Fixture {
    let gateway = Arc::new(MemoryGateway::with_default_houses());

    let teacher = profile("Jan Teacher", TEACHER_EMAIL, Role::Teacher);
    let leader = profile("Lea Leader", LEADER_EMAIL, Role::WhanauLeader);
    let admin = profile("Ari Admin", ADMIN_EMAIL, Role::Admin);

    gateway.seed_account(teacher.clone(), TEACHER_EMAIL, PASSWORD);
    gateway.seed_account(leader.clone(), LEADER_EMAIL, PASSWORD);
    gateway.seed_account(admin.clone(), ADMIN_EMAIL, PASSWORD);

    Fixture {
        gateway,
        teacher,
        leader,
        admin,
    }
}

/// Current point total of one house.
pub async fn points_of(gateway: &MemoryGateway, house_id: &str) -> i64 {
    use houseboard_gateway::Gateway;
    gateway
        .houses()
        .await
        .expect("houses fetch should succeed")
        .into_iter()
        .find(|h| h.id == house_id)
        .map(|h| h.points)
        .unwrap_or_else(|| panic!("no house {house_id}"))
}

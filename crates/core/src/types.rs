/// User identities are UUIDs issued by the gateway's auth service.
pub type UserId = uuid::Uuid;

/// Point request ids are UUIDs assigned by the gateway on insert.
pub type RequestId = uuid::Uuid;

/// House identifiers are stable short keys (e.g. `"kotuku"`), seeded
/// out-of-band and never created or deleted by this application.
pub type HouseId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

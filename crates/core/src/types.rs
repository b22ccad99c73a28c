/// Job identifiers are UUIDv7: opaque to callers, unique for the lifetime
/// of the deployment, and time-ordered so listings sort naturally.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

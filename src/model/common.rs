use uuid::Uuid;

/// Identifier for domain entities (projects, spiders, samples, schemas,
/// extractors). Stored as plain strings so ids survive round-trips through
/// serialized trees unchanged.
pub type Id = String;

/// SHA-256 commit hash, hex encoded.
pub type CommitId = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

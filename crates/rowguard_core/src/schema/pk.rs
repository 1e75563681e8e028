//! Primary-key field and id generation.

use super::FieldDef;
use serde::Serialize;
use uuid::Uuid;

/// Column name of every entity's primary key.
pub const ID_FIELD: &str = "id";

/// Length of generated ids (hyphenated UUID text).
pub const ID_LENGTH: usize = 36;

/// How Create mutations obtain a primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Generate a random v4 UUID when the caller did not set one.
    Uuid,
    /// The caller must always set the id.
    Caller,
}

impl IdStrategy {
    /// Returns a fresh id, or `None` when ids are caller-provided.
    pub fn generate(self) -> Option<String> {
        match self {
            Self::Uuid => Some(Uuid::new_v4().to_string()),
            Self::Caller => None,
        }
    }
}

pub(crate) fn id_field() -> FieldDef {
    FieldDef::text(ID_FIELD)
}

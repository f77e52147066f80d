use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task payload normalized from the upstream's heterogeneous shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Where a member identifier was harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    Id,
    DisplayName,
    Username,
    Email,
    Initials,
    Profile,
}

impl IdentifierSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierSource::Id => "id",
            IdentifierSource::DisplayName => "display_name",
            IdentifierSource::Username => "username",
            IdentifierSource::Email => "email",
            IdentifierSource::Initials => "initials",
            IdentifierSource::Profile => "profile",
        }
    }
}

/// One searchable fact about a record, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub value: String,
    pub source: IdentifierSource,
    pub normalized: String,
    pub tokens: Vec<String>,
}

/// A workspace member with every identifier the payload yielded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub identifiers: Vec<Identifier>,
    pub keywords: Vec<String>,
    pub raw: Value,
}

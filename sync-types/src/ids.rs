//! Identity and addressing types for albumsync.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Check that a value can be used verbatim as a URL path segment or query value.
fn validate_segment(value: &str) -> Result<(), TypesError> {
    if value.is_empty() {
        return Err(TypesError::InvalidId {
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&'))
    {
        return Err(TypesError::InvalidId {
            value: value.to_string(),
            reason: "must not contain whitespace or URL delimiters",
        });
    }
    Ok(())
}

/// Identifier of one client for the realtime channel.
///
/// Generated once per client session and reused for every connect and
/// reconnect. Appears as the last path segment of the channel address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh random client identifier.
    pub fn generate() -> Self {
        Self(format!("client_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Parse a client identifier, rejecting values unusable in a URL.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        let value = value.trim();
        validate_segment(value)?;
        Ok(Self(value.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

/// Conversation identifier carried across reconnects.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Parse a session identifier, rejecting values unusable in a URL.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        let value = value.trim();
        validate_segment(value)?;
        Ok(Self(value.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Path of a folder in the remote hierarchy; the key of a cache entry.
///
/// The root is a reserved key (the empty string) and displays as `/`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FolderPath(String);

impl FolderPath {
    /// The root of the hierarchy.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Create a normalized path.
    ///
    /// Surrounding whitespace and trailing slashes are dropped; `""` and `"/"`
    /// both name the root.
    pub fn new(path: &str) -> Self {
        let trimmed = path.trim();
        let without_trailing = trimmed.trim_end_matches('/');
        if without_trailing.is_empty() {
            return Self::root();
        }
        Self(without_trailing.to_string())
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of a direct child named `name`.
    pub fn child(&self, name: &str) -> Self {
        let name = name.trim().trim_matches('/');
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.0, name))
        }
    }

    /// The raw path string (empty for the root).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FolderPath {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for FolderPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<FolderPath> for String {
    fn from(path: FolderPath) -> Self {
        path.0
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl fmt::Debug for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FolderPath({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // ClientId / SessionId
    // ===========================================

    #[test]
    fn generated_client_ids_are_unique() {
        let a = ClientId::generate();
        let b = ClientId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("client_"));
    }

    #[test]
    fn generated_client_id_parses_back() {
        let id = ClientId::generate();
        let parsed = ClientId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn client_id_rejects_url_delimiters() {
        assert!(ClientId::parse("").is_err());
        assert!(ClientId::parse("a/b").is_err());
        assert!(ClientId::parse("a b").is_err());
        assert!(ClientId::parse("a?b").is_err());
        assert!(matches!(
            ClientId::parse("x#y"),
            Err(TypesError::InvalidId { .. })
        ));
    }

    #[test]
    fn session_id_trims_whitespace() {
        let id = SessionId::parse("  conv-42 ").unwrap();
        assert_eq!(id.as_str(), "conv-42");
    }

    #[test]
    fn session_id_deserialize_validates() {
        let ok: Result<SessionId, _> = serde_json::from_str("\"conv-1\"");
        assert!(ok.is_ok());
        let bad: Result<SessionId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    // ===========================================
    // FolderPath
    // ===========================================

    #[test]
    fn root_forms_are_equal() {
        assert_eq!(FolderPath::new(""), FolderPath::root());
        assert_eq!(FolderPath::new("/"), FolderPath::root());
        assert_eq!(FolderPath::new("  "), FolderPath::root());
        assert!(FolderPath::root().is_root());
    }

    #[test]
    fn trailing_slash_is_dropped() {
        assert_eq!(FolderPath::new("/Trips/Italy/"), FolderPath::new("/Trips/Italy"));
    }

    #[test]
    fn child_of_root_has_no_leading_slash() {
        assert_eq!(FolderPath::root().child("2024").as_str(), "2024");
    }

    #[test]
    fn child_of_nested_path() {
        let trips = FolderPath::new("/Trips");
        assert_eq!(trips.child("Italy").as_str(), "/Trips/Italy");
    }

    #[test]
    fn root_displays_as_slash() {
        assert_eq!(FolderPath::root().to_string(), "/");
        assert_eq!(FolderPath::new("2024").to_string(), "2024");
    }

    #[test]
    fn folder_path_serializes_as_plain_string() {
        let json = serde_json::to_string(&FolderPath::new("/Trips")).unwrap();
        assert_eq!(json, "\"/Trips\"");
        let back: FolderPath = serde_json::from_str("\"/Trips/\"").unwrap();
        assert_eq!(back, FolderPath::new("/Trips"));
    }
}

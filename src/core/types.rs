//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ModuleName`] - Validated YANG module name
//! - [`Revision`] - YANG revision date (`YYYY-MM-DD`)
//! - [`FeatureName`] - Validated YANG feature name
//! - [`PluginName`] - Datastore plugin implementation name
//! - [`Datastore`] - Datastore kind (running/startup/candidate/operational)
//! - [`Fingerprint`] - Registry document hash for divergence detection
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use modstore::core::types::{ModuleName, Revision, Datastore};
//!
//! // Valid constructions
//! let name = ModuleName::new("ietf-interfaces").unwrap();
//! let rev = Revision::new("2018-02-20").unwrap();
//! assert_eq!(Datastore::Running.as_str(), "running");
//!
//! // Invalid constructions fail at creation time
//! assert!(ModuleName::new("9-starts-with-digit").is_err());
//! assert!(Revision::new("not-a-date").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid module name: {0}")]
    InvalidModuleName(String),

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    #[error("invalid feature name: {0}")]
    InvalidFeatureName(String),

    #[error("invalid plugin name: {0}")]
    InvalidPluginName(String),

    #[error("unknown datastore: {0}")]
    UnknownDatastore(String),
}

/// Validate a YANG identifier (RFC 7950 section 6.2).
///
/// Identifiers start with a letter or underscore, continue with letters,
/// digits, underscores, hyphens, and dots, and must not begin with the
/// string `xml` in any case combination.
fn validate_identifier(name: &str, kind: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{kind} cannot be empty"));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(format!(
                "{kind} must start with a letter or underscore, got '{first}'"
            ));
        }
    }

    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
            return Err(format!("{kind} cannot contain '{c}'"));
        }
    }

    if name.len() >= 3 && name[..3].eq_ignore_ascii_case("xml") {
        return Err(format!("{kind} cannot begin with 'xml'"));
    }

    Ok(())
}

/// A validated YANG module name.
///
/// Module names follow YANG identifier rules:
/// - Must start with a letter or underscore
/// - May contain letters, digits, `_`, `-`, and `.`
/// - Must not begin with `xml` (reserved, case-insensitive)
///
/// # Example
///
/// ```
/// use modstore::core::types::ModuleName;
///
/// let name = ModuleName::new("iana-if-type").unwrap();
/// assert_eq!(name.as_str(), "iana-if-type");
///
/// assert!(ModuleName::new("").is_err());
/// assert!(ModuleName::new("has space").is_err());
/// assert!(ModuleName::new("XML-anything").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a new validated module name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidModuleName` if the name violates YANG
    /// identifier rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_identifier(&name, "module name").map_err(TypeError::InvalidModuleName)?;
        Ok(Self(name))
    }

    /// Get the module name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.0
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A YANG revision date in `YYYY-MM-DD` form.
///
/// Only the shape is validated (calendar plausibility, not full calendar
/// arithmetic); the schema layer owns real revision semantics.
///
/// # Example
///
/// ```
/// use modstore::core::types::Revision;
///
/// let rev = Revision::new("2018-02-20").unwrap();
/// assert_eq!(rev.as_str(), "2018-02-20");
///
/// assert!(Revision::new("2018-2-20").is_err());
/// assert!(Revision::new("2018-13-01").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Create a new validated revision date.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRevision` if the string is not a
    /// plausible `YYYY-MM-DD` date.
    pub fn new(rev: impl Into<String>) -> Result<Self, TypeError> {
        let rev = rev.into();
        Self::validate(&rev)?;
        Ok(Self(rev))
    }

    fn validate(rev: &str) -> Result<(), TypeError> {
        let bytes = rev.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(TypeError::InvalidRevision(format!(
                "expected YYYY-MM-DD, got '{rev}'"
            )));
        }
        let digits_ok = bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !digits_ok {
            return Err(TypeError::InvalidRevision(format!(
                "expected YYYY-MM-DD, got '{rev}'"
            )));
        }

        let month: u32 = rev[5..7].parse().unwrap_or(0);
        let day: u32 = rev[8..10].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(TypeError::InvalidRevision(format!(
                "month out of range in '{rev}'"
            )));
        }
        if !(1..=31).contains(&day) {
            return Err(TypeError::InvalidRevision(format!(
                "day out of range in '{rev}'"
            )));
        }

        Ok(())
    }

    /// Get the revision as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Revision {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}

impl AsRef<str> for Revision {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated YANG feature name.
///
/// Feature names follow the same identifier rules as module names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureName(String);

impl FeatureName {
    /// Create a new validated feature name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidFeatureName` if the name violates YANG
    /// identifier rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_identifier(&name, "feature name").map_err(TypeError::InvalidFeatureName)?;
        Ok(Self(name))
    }

    /// Get the feature name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FeatureName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FeatureName> for String {
    fn from(name: FeatureName) -> Self {
        name.0
    }
}

impl AsRef<str> for FeatureName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeatureName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of a datastore plugin implementation.
///
/// Plugin names are opaque to the registry; they are resolved by the
/// datastore-plugin layer. Only basic shape is enforced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginName(String);

impl PluginName {
    /// Create a new validated plugin name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPluginName` if the name is empty or
    /// contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidPluginName(
                "plugin name cannot be empty".into(),
            ));
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidPluginName(
                "plugin name cannot contain control characters".into(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the plugin name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PluginName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PluginName> for String {
    fn from(name: PluginName) -> Self {
        name.0
    }
}

impl AsRef<str> for PluginName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PluginName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A datastore kind.
///
/// Each installed module binds one plugin per datastore kind. The three
/// configuration datastores hold editable config; the operational datastore
/// holds state data and is handled separately by the plugin layer.
///
/// # Example
///
/// ```
/// use modstore::core::types::Datastore;
/// use std::str::FromStr;
///
/// assert_eq!(Datastore::Startup.as_str(), "startup");
/// assert_eq!(Datastore::from_str("candidate").unwrap(), Datastore::Candidate);
/// assert!(Datastore::from_str("bogus").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    /// The currently active configuration.
    Running,
    /// Configuration loaded at startup.
    Startup,
    /// Scratch configuration staged for commit.
    Candidate,
    /// Operational state data.
    Operational,
}

impl Datastore {
    /// All datastore kinds, in canonical order.
    pub const ALL: [Datastore; 4] = [
        Datastore::Running,
        Datastore::Startup,
        Datastore::Candidate,
        Datastore::Operational,
    ];

    /// The configuration datastores (everything except operational).
    pub const CONFIG: [Datastore; 3] = [
        Datastore::Running,
        Datastore::Startup,
        Datastore::Candidate,
    ];

    /// Get the canonical lowercase name of the datastore.
    pub fn as_str(&self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Startup => "startup",
            Datastore::Candidate => "candidate",
            Datastore::Operational => "operational",
        }
    }
}

impl std::str::FromStr for Datastore {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Datastore::Running),
            "startup" => Ok(Datastore::Startup),
            "candidate" => Ok(Datastore::Candidate),
            "operational" => Ok(Datastore::Operational),
            other => Err(TypeError::UnknownDatastore(other.to_string())),
        }
    }
}

impl std::fmt::Display for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stable hash over a serialized registry document.
///
/// Readers compare fingerprints across loads to detect that a writer has
/// replaced the document in between, without parsing it again.
///
/// # Example
///
/// ```
/// use modstore::core::types::Fingerprint;
///
/// let fp1 = Fingerprint::compute(b"{\"modules\":[]}");
/// let fp2 = Fingerprint::compute(b"{\"modules\":[]}");
/// assert_eq!(fp1, fp2);
///
/// let fp3 = Fingerprint::compute(b"{\"modules\":[1]}");
/// assert_ne!(fp1, fp3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over document bytes.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

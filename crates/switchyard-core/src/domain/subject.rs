use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Opaque caller-supplied identifier of the aggregation target.
///
/// The core never validates the format; transports may reject ids their
/// upstream cannot address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Immutable core identity of a subject, resolved locally before fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectIdentity {
    pub user_id: SubjectId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Local subject lookup. Synchronous: it runs once per request, before any
/// provider is dispatched, and involves no fan-out.
pub trait SubjectResolver: Send + Sync {
    /// Returns `None` when the subject is unknown.
    fn resolve(&self, subject: &SubjectId) -> Option<SubjectIdentity>;
}

/// In-memory subject directory.
#[derive(Debug, Clone, Default)]
pub struct SubjectDirectory {
    subjects: HashMap<SubjectId, SubjectIdentity>,
}

impl SubjectDirectory {
    pub fn new(identities: impl IntoIterator<Item = SubjectIdentity>) -> Self {
        let subjects = identities
            .into_iter()
            .map(|identity| (identity.user_id.clone(), identity))
            .collect();
        Self { subjects }
    }

    /// Loads a JSON array of identities.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let identities: Vec<SubjectIdentity> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        Ok(Self::new(identities))
    }

    /// Small fixed directory used by mock mode and tests.
    pub fn demo() -> Self {
        Self::new([
            SubjectIdentity {
                user_id: SubjectId::new("acct-42"),
                email: String::from("ada@example.test"),
                first_name: String::from("Ada"),
                last_name: String::from("Lovelace"),
            },
            SubjectIdentity {
                user_id: SubjectId::new("acct-7"),
                email: String::from("grace@example.test"),
                first_name: String::from("Grace"),
                last_name: String::from("Hopper"),
            },
        ])
    }

    pub fn insert(&mut self, identity: SubjectIdentity) {
        self.subjects.insert(identity.user_id.clone(), identity);
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl SubjectResolver for SubjectDirectory {
    fn resolve(&self, subject: &SubjectId) -> Option<SubjectIdentity> {
        self.subjects.get(subject).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn demo_directory_resolves_known_subject() {
        let directory = SubjectDirectory::demo();

        let identity = directory
            .resolve(&SubjectId::new("acct-42"))
            .expect("demo subject exists");

        assert_eq!(identity.first_name, "Ada");
        assert!(directory.resolve(&SubjectId::new("acct-404")).is_none());
    }

    #[test]
    fn loads_directory_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"userId":"u-1","email":"u1@example.test","firstName":"U","lastName":"One"}}]"#
        )
        .expect("write");

        let directory = SubjectDirectory::from_json_file(file.path())
            .expect("valid file");

        assert_eq!(directory.len(), 1);
        let identity = directory.resolve(&SubjectId::new("u-1")).expect("present");
        assert_eq!(identity.email, "u1@example.test");
    }

    #[test]
    fn missing_directory_file_reports_path() {
        let error = SubjectDirectory::from_json_file(Path::new("/nonexistent/subjects.json"))
            .expect_err("missing file");

        assert!(error.to_string().contains("/nonexistent/subjects.json"));
    }
}

// endpoint.rs - The immutable endpoint-name -> root-path table.
//
// Built once at startup and shared behind an `Arc`. There is no writer after
// construction, so handlers read it concurrently without a lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{EndpointError, FsynError};

/// Named filesystem roots exposed through the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointTable {
    roots: BTreeMap<String, PathBuf>,
}

impl EndpointTable {
    /// Validate and build the table.
    ///
    /// Names are trimmed and must be non-empty, unique, and free of `/`
    /// (the first `/` of a descriptor ends the endpoint name). Roots must
    /// be absolute.
    pub fn new<I, N, P>(entries: I) -> Result<Self, EndpointError>
    where
        I: IntoIterator<Item = (N, P)>,
        N: AsRef<str>,
        P: Into<PathBuf>,
    {
        let mut roots = BTreeMap::new();
        for (name, root) in entries {
            let name = name.as_ref().trim();
            let root = root.into();

            if name.is_empty() {
                return Err(EndpointError::EmptyName);
            }
            if name.contains('/') {
                return Err(EndpointError::InvalidName {
                    name: name.to_string(),
                });
            }
            if !root.is_absolute() {
                return Err(EndpointError::RelativeRoot {
                    name: name.to_string(),
                    root,
                });
            }
            if roots.insert(name.to_string(), root).is_some() {
                return Err(EndpointError::Duplicate {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self { roots })
    }

    /// Root of an endpoint, if configured.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.roots.get(name).map(PathBuf::as_path)
    }

    /// Root of an endpoint, or `EndpointNotFound`.
    pub fn root_of(&self, name: &str) -> Result<&Path, FsynError> {
        self.get(name).ok_or_else(|| FsynError::EndpointNotFound {
            name: name.to_string(),
        })
    }

    /// Endpoint names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.roots.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roots.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_sorted_names() {
        let table = EndpointTable::new([("docs", "/srv/docs"), ("art", "/srv/art")]).unwrap();
        assert_eq!(table.get("docs"), Some(Path::new("/srv/docs")));
        assert_eq!(table.names(), vec!["art".to_string(), "docs".to_string()]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_endpoint_is_not_found() {
        let table = EndpointTable::new([("docs", "/srv/docs")]).unwrap();
        let err = table.root_of("nope").unwrap_err();
        assert!(matches!(err, FsynError::EndpointNotFound { name } if name == "nope"));
    }

    #[test]
    fn names_are_trimmed() {
        let table = EndpointTable::new([("  docs ", "/srv/docs")]).unwrap();
        assert!(table.get("docs").is_some());
    }

    #[test]
    fn invalid_entries_are_rejected() {
        assert_eq!(
            EndpointTable::new([(" ", "/srv")]).unwrap_err(),
            EndpointError::EmptyName
        );
        assert!(matches!(
            EndpointTable::new([("a/b", "/srv")]).unwrap_err(),
            EndpointError::InvalidName { .. }
        ));
        assert!(matches!(
            EndpointTable::new([("docs", "relative/dir")]).unwrap_err(),
            EndpointError::RelativeRoot { .. }
        ));
        assert!(matches!(
            EndpointTable::new([("docs", "/a"), ("docs ", "/b")]).unwrap_err(),
            EndpointError::Duplicate { .. }
        ));
    }
}

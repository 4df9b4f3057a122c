// descriptor.rs - Parsing "<endpoint>/<relative path>" descriptors.
//
// Pure string handling: no filesystem access and no `.`/`..` normalization.
// Escapes are caught later by the containment guard.

use std::fmt;
use std::str::FromStr;

use crate::error::FsynError;

/// An endpoint name plus a path relative to that endpoint's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDescriptor {
    pub endpoint: String,
    pub relative_path: String,
}

impl PathDescriptor {
    /// Parse a descriptor, splitting on the first `/` only.
    ///
    /// The whole input is trimmed first, then each half independently.
    /// Both halves must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, FsynError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FsynError::MissingField {
                field: "descriptor",
            });
        }

        let Some((endpoint, relative_path)) = trimmed.split_once('/') else {
            return Err(FsynError::MalformedDescriptor {
                descriptor: trimmed.to_string(),
                reason: "no path separator",
            });
        };

        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(FsynError::MalformedDescriptor {
                descriptor: trimmed.to_string(),
                reason: "endpoint is empty",
            });
        }

        let relative_path = relative_path.trim();
        if relative_path.is_empty() {
            return Err(FsynError::MalformedDescriptor {
                descriptor: trimmed.to_string(),
                reason: "file path is empty",
            });
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            relative_path: relative_path.to_string(),
        })
    }
}

impl FromStr for PathDescriptor {
    type Err = FsynError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind_of(raw: &str) -> ErrorKind {
        PathDescriptor::parse(raw).unwrap_err().kind()
    }

    #[test]
    fn splits_on_first_separator_only() {
        let d = PathDescriptor::parse("docs/notes/todo.txt").unwrap();
        assert_eq!(d.endpoint, "docs");
        assert_eq!(d.relative_path, "notes/todo.txt");
    }

    #[test]
    fn trims_whole_input_and_each_part() {
        let d: PathDescriptor = "  docs  / a b.txt \n".parse().unwrap();
        assert_eq!(d.endpoint, "docs");
        assert_eq!(d.relative_path, "a b.txt");
        assert_eq!(d.to_string(), "docs/a b.txt");
    }

    #[test]
    fn empty_input_is_missing_field() {
        assert_eq!(kind_of(""), ErrorKind::MissingField);
        assert_eq!(kind_of("   "), ErrorKind::MissingField);
    }

    #[test]
    fn malformed_shapes() {
        assert_eq!(kind_of("docs"), ErrorKind::MalformedDescriptor);
        assert_eq!(kind_of("/file.txt"), ErrorKind::MalformedDescriptor);
        assert_eq!(kind_of("docs/"), ErrorKind::MalformedDescriptor);
        assert_eq!(kind_of(" /  "), ErrorKind::MalformedDescriptor);
        assert_eq!(kind_of("docs/   "), ErrorKind::MalformedDescriptor);
    }

    #[test]
    fn dot_segments_are_left_alone() {
        let d = PathDescriptor::parse("docs/../../etc/passwd").unwrap();
        assert_eq!(d.relative_path, "../../etc/passwd");
    }
}

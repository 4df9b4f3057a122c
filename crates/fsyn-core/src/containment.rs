// containment.rs - Keeping caller-supplied paths inside an endpoint root.
//
// Every operation that turns a caller-controlled relative path into a
// filesystem path goes through `join_within` and then `ContainmentMode::check`.
// This is the single boundary between a descriptor and the disk.
//
// The lexical check never touches the filesystem: both paths are cleaned
// (`.` dropped, `..` folded into its parent) and the candidate is
// relativized against the root. A relative result starting with `..` means
// the candidate escaped.
//
// The lexical check cannot see symlinks. `ContainmentMode::Resolved` repeats
// the check on real paths: the root and the deepest existing ancestor of the
// candidate are canonicalized first, so a link inside the endpoint that
// points outside it is rejected too.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FsynError;
use crate::fs::{is_absent, Filesystem};

/// How strictly candidates are checked against their endpoint root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentMode {
    /// Path-string check only. Symlinks inside the root may point anywhere.
    Lexical,
    /// Lexical check, then the same check on symlink-resolved paths.
    #[default]
    Resolved,
}

impl ContainmentMode {
    /// Decide whether `candidate` lies within `root`.
    pub fn check<F: Filesystem + ?Sized>(
        self,
        fs: &F,
        root: &Path,
        candidate: &Path,
    ) -> Result<bool, FsynError> {
        if !is_contained(root, candidate)? {
            return Ok(false);
        }
        match self {
            ContainmentMode::Lexical => Ok(true),
            ContainmentMode::Resolved => is_contained_resolved(fs, root, candidate),
        }
    }
}

/// Lexically normalize a path without consulting the filesystem.
///
/// `..` directly under the filesystem root stays at the root; leading `..`
/// components of a relative path are kept.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut normals = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if normals > 0 {
                    out.pop();
                    normals -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => {
                out.push(name);
                normals += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Append a caller-supplied relative path to `root` and clean the result.
///
/// Unlike `Path::join`, an absolute `relative` does not replace the root:
/// root and prefix components of `relative` are dropped, so `/etc/passwd`
/// becomes `<root>/etc/passwd`. `..` components are kept for `clean` to
/// fold, which is what lets the guard see an escape.
pub fn join_within(root: &Path, relative: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => joined.push(".."),
            Component::Normal(name) => joined.push(name),
        }
    }
    clean(&joined)
}

/// Lexically compute `candidate` relative to `root`.
///
/// Returns `None` when no relative path exists (one path absolute and the
/// other not, or the root itself climbs out with `..` past the shared part).
pub fn relativize(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = clean(root);
    let candidate = clean(candidate);
    if root.has_root() != candidate.has_root() {
        return None;
    }

    let root_parts: Vec<Component<'_>> = root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let candidate_parts: Vec<Component<'_>> = candidate
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let shared = root_parts
        .iter()
        .zip(candidate_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for part in &root_parts[shared..] {
        if matches!(part, Component::ParentDir) {
            return None;
        }
        relative.push("..");
    }
    for part in &candidate_parts[shared..] {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Some(relative)
}

/// Lexical containment: `false` iff the relative path is `..` or starts
/// with a `..` component.
pub fn is_contained(root: &Path, candidate: &Path) -> Result<bool, FsynError> {
    let relative = relativize(root, candidate).ok_or_else(|| FsynError::Unrelatable {
        root: root.to_path_buf(),
        candidate: candidate.to_path_buf(),
    })?;
    Ok(!matches!(
        relative.components().next(),
        Some(Component::ParentDir)
    ))
}

/// Containment on real paths.
///
/// The candidate may not exist yet (uploads), so the deepest existing
/// ancestor is canonicalized and the missing tail is re-attached. The tail
/// is clean by construction, so it holds only normal components.
pub fn is_contained_resolved<F: Filesystem + ?Sized>(
    fs: &F,
    root: &Path,
    candidate: &Path,
) -> Result<bool, FsynError> {
    let real_root = fs.canonicalize(root).map_err(FsynError::io(root))?;
    let candidate = clean(candidate);

    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    let mut cursor: &Path = &candidate;
    let real_ancestor = loop {
        match fs.canonicalize(cursor) {
            Ok(real) => break real,
            Err(e) if is_absent(&e) => {
                let (Some(parent), Some(name)) = (cursor.parent(), cursor.file_name()) else {
                    return Err(FsynError::io(cursor)(e));
                };
                tail.push(name);
                cursor = parent;
            }
            Err(e) => return Err(FsynError::io(cursor)(e)),
        }
    };

    let mut real_candidate = real_ancestor;
    for name in tail.iter().rev() {
        real_candidate.push(name);
    }
    is_contained(&real_root, &real_candidate)
}

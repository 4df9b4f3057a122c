// tree.rs - Recursive directory trees keyed by entry name.
//
// `build_tree` is a pure recursive function: each call lists one directory
// and returns a freshly built map of its children. Nothing is mutated while
// it is being walked, and any listing or metadata failure aborts the whole
// build, so callers never see a partial tree.
//
// Only entries the listing reports as real directories are descended;
// symlinks are recorded as leaves and never followed, which keeps the
// result a tree.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FsynError;
use crate::fs::{DirEntry, Filesystem};

/// Name-keyed children of a directory (or the single-root wrapper).
pub type Tree = BTreeMap<String, TreeNode>;

/// One filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: String,
    pub is_dir: bool,
    /// Byte length for files, 0 for directories.
    pub size: u64,
    /// Absent for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub children: Tree,
}

impl TreeNode {
    pub fn dir(name: impl Into<String>, children: Tree) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
            last_modified: None,
            children,
        }
    }

    pub fn file(name: impl Into<String>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
            last_modified,
            children: Tree::new(),
        }
    }

    /// Number of entries below this node, not counting itself.
    pub fn descendants(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.descendants())
            .sum()
    }
}

/// Limits applied while building a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Deepest directory level that may be listed; the root is level 0.
    /// `None` means unbounded.
    pub max_depth: Option<usize>,
}

/// Build `{root_name: <root directory node>}` for the directory at `root`.
pub fn build_tree<F: Filesystem + ?Sized>(
    fs: &F,
    root_name: &str,
    root: &Path,
    options: TreeOptions,
) -> Result<Tree, FsynError> {
    let children = build_children(fs, root, 0, options)?;
    let mut tree = Tree::new();
    tree.insert(root_name.to_string(), TreeNode::dir(root_name, children));
    Ok(tree)
}

fn build_children<F: Filesystem + ?Sized>(
    fs: &F,
    dir: &Path,
    depth: usize,
    options: TreeOptions,
) -> Result<Tree, FsynError> {
    if let Some(limit) = options.max_depth {
        if depth > limit {
            return Err(FsynError::TreeTooDeep {
                path: dir.to_path_buf(),
                limit,
            });
        }
    }

    let entries = fs.read_dir(dir).map_err(FsynError::io(dir))?;

    entries
        .into_iter()
        .map(|DirEntry { name, meta }| -> Result<(String, TreeNode), FsynError> {
            let node = if meta.is_dir {
                let children = build_children(fs, &dir.join(&name), depth + 1, options)?;
                TreeNode::dir(name.clone(), children)
            } else {
                TreeNode::file(name.clone(), meta.len, meta.modified.map(DateTime::<Utc>::from))
            };
            Ok((name, node))
        })
        .collect()
}

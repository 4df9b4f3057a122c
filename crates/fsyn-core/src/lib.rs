//! # fsyn-core
//!
//! Path containment, tree traversal, digests and transfers for fsyn.
//!
//! fsyn exposes named filesystem roots ("endpoints") over HTTP. This crate
//! holds everything below the HTTP layer and stays synchronous; the daemon
//! runs it on the blocking pool.
//!
//! ## Key components
//!
//! - [`PathDescriptor`] - parses `"<endpoint>/<relative path>"`.
//! - [`containment`] - lexical and symlink-resolved root containment.
//! - [`build_tree`] - nested name-keyed directory trees, all-or-nothing.
//! - [`digest`] - streaming xxHash64 with a size ceiling.
//! - [`Transfer`] - list, download, hash and upload over a [`Filesystem`].
//! - [`FsynError`] - the failure taxonomy, with [`ErrorKind`] and [`Severity`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fsyn_core::{EndpointTable, Transfer, TransferSettings};
//!
//! let table = EndpointTable::new([("docs", "/srv/docs")]).unwrap();
//! let transfer = Transfer::local(Arc::new(table), TransferSettings::default());
//! let digest = transfer.hash("docs/notes/todo.txt").unwrap();
//! println!("{} {}", digest.file, digest.hash);
//! ```

pub mod auth;
pub mod containment;
pub mod descriptor;
pub mod digest;
pub mod endpoint;
pub mod error;
pub mod fs;
pub mod transfer;
pub mod tree;

pub use auth::TokenSet;
pub use containment::ContainmentMode;
pub use descriptor::PathDescriptor;
pub use endpoint::EndpointTable;
pub use error::{EndpointError, ErrorKind, FsynError, Severity};
pub use fs::{Filesystem, LocalFs};
pub use transfer::{
    Download, EndpointListing, FileHash, Transfer, TransferSettings, TreeListing, UploadRequest,
};
pub use tree::{build_tree, Tree, TreeNode, TreeOptions};

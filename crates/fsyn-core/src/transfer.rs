// transfer.rs - Endpoint operations: list, download, hash, upload.
//
// `Transfer` is the bridge between descriptor strings coming off the wire
// and the filesystem. Every operation that takes a descriptor runs the same
// pipeline before touching the disk:
//
//   descriptor -> PathDescriptor -> endpoint root -> join_within -> guard
//
// and only then stats, reads, or writes the resolved path. Results are typed
// payloads ready for the response envelope; failures are `FsynError`s.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::containment::{join_within, ContainmentMode};
use crate::descriptor::PathDescriptor;
use crate::digest::{self, DEFAULT_MAX_HASH_SIZE};
use crate::endpoint::EndpointTable;
use crate::error::FsynError;
use crate::fs::{is_absent, Filesystem, LocalFs};
use crate::tree::{build_tree, Tree, TreeOptions};

/// Default ceiling on a single upload body: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Operation limits and policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// Hashing ceiling in bytes; 0 disables it.
    pub max_hash_size: u64,
    /// Upload body ceiling in bytes; 0 disables it.
    pub max_upload_size: u64,
    pub containment: ContainmentMode,
    pub tree: TreeOptions,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_hash_size: DEFAULT_MAX_HASH_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            containment: ContainmentMode::default(),
            tree: TreeOptions::default(),
        }
    }
}

/// `{tree: ...}` payload of a tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeListing {
    pub tree: Tree,
}

/// `{endpoints: [...]}` payload of the endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointListing {
    pub endpoints: Vec<String>,
}

/// `{hash, file}` payload; `file` echoes the descriptor for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub hash: String,
    pub file: String,
}

/// An opened file ready to be streamed back untransformed.
#[derive(Debug)]
pub struct Download<R> {
    pub path: PathBuf,
    pub size: u64,
    pub reader: R,
}

/// Inputs of an upload besides the body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadRequest {
    pub descriptor: String,
    /// Replace an existing file.
    pub force: bool,
    /// Create missing parent directories.
    pub recursive: bool,
}

/// A descriptor that passed resolution and the containment guard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Located {
    endpoint: String,
    path: PathBuf,
}

/// Endpoint operations over a [`Filesystem`].
///
/// Generic over `F: Filesystem` so tests can swap in stub filesystems;
/// production uses [`LocalFs`].
#[derive(Debug, Clone)]
pub struct Transfer<F: Filesystem = LocalFs> {
    endpoints: Arc<EndpointTable>,
    fs: F,
    settings: TransferSettings,
}

impl Transfer<LocalFs> {
    /// Operations against the real filesystem.
    pub fn local(endpoints: Arc<EndpointTable>, settings: TransferSettings) -> Self {
        Self::new(endpoints, LocalFs, settings)
    }
}

impl<F: Filesystem> Transfer<F> {
    pub fn new(endpoints: Arc<EndpointTable>, fs: F, settings: TransferSettings) -> Self {
        Self {
            endpoints,
            fs,
            settings,
        }
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Names of all configured endpoints, sorted.
    pub fn list_endpoints(&self) -> EndpointListing {
        EndpointListing {
            endpoints: self.endpoints.names(),
        }
    }

    /// Full directory tree of one endpoint.
    pub fn list_tree(&self, endpoint: &str) -> Result<TreeListing, FsynError> {
        let name = endpoint.trim();
        if name.is_empty() {
            return Err(FsynError::MissingField { field: "endpoint" });
        }
        let root = self.endpoints.root_of(name)?;

        let meta = self.fs.metadata(root).map_err(FsynError::io(root))?;
        if !meta.is_dir {
            return Err(FsynError::NotADirectory {
                name: name.to_string(),
                path: root.to_path_buf(),
            });
        }

        let display_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let tree = build_tree(&self.fs, &display_name, root, self.settings.tree)?;
        tracing::debug!(
            endpoint = name,
            entries = tree.values().map(|n| n.descendants()).sum::<usize>(),
            "built endpoint tree"
        );
        Ok(TreeListing { tree })
    }

    /// Open a file for download.
    pub fn download(&self, descriptor: &str) -> Result<Download<F::Reader>, FsynError> {
        let located = self.locate(descriptor)?;
        let path = located.path;

        let meta = self.fs.metadata(&path).map_err(|e| not_found_or_io(&path, e))?;
        if meta.is_dir {
            return Err(FsynError::PathIsDirectory { path });
        }

        let reader = self.fs.open(&path).map_err(|e| not_found_or_io(&path, e))?;
        tracing::debug!(
            endpoint = %located.endpoint,
            path = %path.display(),
            size = meta.len,
            "serving download"
        );
        Ok(Download {
            path,
            size: meta.len,
            reader,
        })
    }

    /// Content digest of a file.
    pub fn hash(&self, descriptor: &str) -> Result<FileHash, FsynError> {
        let located = self.locate(descriptor)?;
        let hash = digest::hash_file(&self.fs, &located.path, self.settings.max_hash_size)?;
        Ok(FileHash {
            hash,
            file: descriptor.trim().to_string(),
        })
    }

    /// Reject an upload whose announced length is over the ceiling, before
    /// any byte of it is read.
    pub fn check_upload_size(&self, descriptor: &str, declared: u64) -> Result<(), FsynError> {
        let limit = self.settings.max_upload_size;
        if limit > 0 && declared > limit {
            return Err(FsynError::UploadTooLarge {
                descriptor: descriptor.trim().to_string(),
                limit,
            });
        }
        Ok(())
    }

    /// Create (or with `force`, replace) a file from `body`.
    ///
    /// Returns the number of bytes written. Nothing on disk changes unless
    /// the descriptor passed the guard and the checks below. A body that
    /// runs past `max_upload_size` aborts the write.
    pub fn upload<R: Read>(&self, request: &UploadRequest, body: R) -> Result<u64, FsynError> {
        let located = self.locate(&request.descriptor)?;
        let path = located.path;

        match self.fs.metadata(&path) {
            Ok(meta) if meta.is_dir => return Err(FsynError::PathIsDirectory { path }),
            Ok(_) if !request.force => return Err(FsynError::AlreadyExists { path }),
            Ok(_) => {}
            Err(e) if is_absent(&e) => {
                self.ensure_parent(&path, request.recursive)?;
            }
            Err(e) => return Err(FsynError::io(&path)(e)),
        }

        let mut capped = CappedReader::new(body, self.settings.max_upload_size);
        let written = self
            .fs
            .write_atomic(&path, &mut capped, request.force)
            .map_err(|e| {
                if capped.exceeded {
                    FsynError::UploadTooLarge {
                        descriptor: request.descriptor.trim().to_string(),
                        limit: self.settings.max_upload_size,
                    }
                } else if e.kind() == io::ErrorKind::AlreadyExists {
                    FsynError::AlreadyExists { path: path.clone() }
                } else {
                    FsynError::io(&path)(e)
                }
            })?;

        tracing::info!(
            endpoint = %located.endpoint,
            path = %path.display(),
            bytes = written,
            force = request.force,
            "stored upload"
        );
        Ok(written)
    }

    /// Resolve a descriptor and run the containment guard.
    fn locate(&self, descriptor: &str) -> Result<Located, FsynError> {
        let parsed = PathDescriptor::parse(descriptor)?;
        let root = self.endpoints.root_of(&parsed.endpoint)?;
        let path = join_within(root, &parsed.relative_path);

        if !self.settings.containment.check(&self.fs, root, &path)? {
            return Err(FsynError::OutOfEndpoint {
                descriptor: descriptor.trim().to_string(),
                path,
                root: root.to_path_buf(),
            });
        }

        Ok(Located {
            endpoint: parsed.endpoint,
            path,
        })
    }

    fn ensure_parent(&self, path: &Path, recursive: bool) -> Result<(), FsynError> {
        let Some(parent) = path.parent() else {
            return Err(FsynError::ParentMissing {
                path: path.to_path_buf(),
                detail: "base directory does not exist",
            });
        };

        let not_a_dir = || FsynError::ParentMissing {
            path: parent.to_path_buf(),
            detail: "base path is not a dir",
        };

        match self.fs.metadata(parent) {
            Ok(meta) if meta.is_dir => Ok(()),
            Ok(_) => Err(not_a_dir()),
            // Some ancestor of the parent is a regular file.
            Err(e) if e.kind() == io::ErrorKind::NotADirectory => Err(not_a_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !recursive {
                    return Err(FsynError::ParentMissing {
                        path: parent.to_path_buf(),
                        detail: "base directory does not exist",
                    });
                }
                self.fs.create_dir_all(parent).map_err(|e| {
                    if e.kind() == io::ErrorKind::NotADirectory {
                        not_a_dir()
                    } else {
                        FsynError::io(parent)(e)
                    }
                })?;
                tracing::debug!(dir = %parent.display(), "created parent directories");
                Ok(())
            }
            Err(e) => Err(FsynError::io(parent)(e)),
        }
    }
}

/// Body reader that fails once more than `limit` bytes have come through.
struct CappedReader<R> {
    inner: R,
    remaining: u64,
    exceeded: bool,
}

impl<R> CappedReader<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: if limit == 0 { u64::MAX } else { limit },
            exceeded: false,
        }
    }
}

impl<R: Read> Read for CappedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n as u64 > self.remaining {
            self.exceeded = true;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "upload body exceeds the size limit",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn not_found_or_io(path: &Path, e: io::Error) -> FsynError {
    if is_absent(&e) {
        FsynError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        FsynError::io(path)(e)
    }
}

// error.rs - Error taxonomy for endpoint operations.
//
// Every failure an operation can produce is one `FsynError` variant. Each
// variant carries three facets:
//   - `kind()`         a fieldless `ErrorKind`, mapped to a status by the daemon
//   - `user_message()` what the caller sees
//   - `Display`        the detailed log line (paths, io sources)
//
// Filesystem faults never leak paths through `user_message()`.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by endpoint resolution, containment, and transfers.
#[derive(Debug, Error)]
pub enum FsynError {
    /// A required input (descriptor, header, endpoint name) was empty or absent.
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The descriptor could not be split into endpoint and relative path.
    #[error("malformed descriptor '{descriptor}': {reason}")]
    MalformedDescriptor {
        descriptor: String,
        reason: &'static str,
    },

    /// No endpoint is configured under this name.
    #[error("endpoint '{name}' not found")]
    EndpointNotFound { name: String },

    /// The endpoint's configured root exists but is not a directory.
    #[error("endpoint '{name}' root {path} is not a directory")]
    NotADirectory { name: String, path: PathBuf },

    /// The descriptor resolves to a location outside its endpoint root.
    #[error("descriptor '{descriptor}' resolves to {path}, outside endpoint root {root}")]
    OutOfEndpoint {
        descriptor: String,
        path: PathBuf,
        root: PathBuf,
    },

    /// The target path does not exist.
    #[error("{path} not found")]
    NotFound { path: PathBuf },

    /// The target path is a directory where a file was required.
    #[error("{path} is a directory")]
    PathIsDirectory { path: PathBuf },

    /// Upload target already exists and `force` was not set.
    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },

    /// The upload target's parent is absent (or not a directory) and
    /// `recursive` was not set.
    #[error("parent {path}: {detail}")]
    ParentMissing { path: PathBuf, detail: &'static str },

    /// The file is bigger than the configured hashing ceiling.
    #[error("{path} is {size} bytes, over the hash limit of {limit} bytes")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The upload body is bigger than the configured upload ceiling.
    #[error("upload to '{descriptor}' exceeds the limit of {limit} bytes")]
    UploadTooLarge { descriptor: String, limit: u64 },

    /// The directory tree is deeper than the configured bound.
    #[error("directory tree under {path} exceeds the depth limit of {limit}")]
    TreeTooDeep { path: PathBuf, limit: usize },

    /// No `Authorization` header was sent.
    #[error("request has no authorization header")]
    MissingAuth,

    /// The `Authorization` header is not of the form `Bearer <token>`.
    #[error("malformed authorization header (scheme '{scheme}')")]
    BadAuth { scheme: String },

    /// The bearer token is not in the token set.
    #[error("bearer token is not recognized")]
    InvalidToken,

    /// A filesystem call failed.
    #[error("I/O error at {path}: {source}")]
    IoError { path: PathBuf, source: io::Error },

    /// Lexical relativization is impossible (e.g. absolute vs relative).
    #[error("cannot relate {candidate} to root {root}")]
    Unrelatable { root: PathBuf, candidate: PathBuf },
}

/// Fieldless discriminant of [`FsynError`], one per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingField,
    MalformedDescriptor,
    EndpointNotFound,
    NotADirectory,
    OutOfEndpoint,
    NotFound,
    PathIsDirectory,
    AlreadyExists,
    ParentMissing,
    FileTooLarge,
    UploadTooLarge,
    TreeTooDeep,
    MissingAuth,
    BadAuth,
    InvalidToken,
    Filesystem,
}

/// Log level a failure kind is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client-caused or expected policy outcome.
    Warn,
    /// Unexpected server-side fault.
    Error,
}

impl ErrorKind {
    /// Every kind, for exhaustive mapping checks.
    pub const ALL: [ErrorKind; 16] = [
        ErrorKind::MissingField,
        ErrorKind::MalformedDescriptor,
        ErrorKind::EndpointNotFound,
        ErrorKind::NotADirectory,
        ErrorKind::OutOfEndpoint,
        ErrorKind::NotFound,
        ErrorKind::PathIsDirectory,
        ErrorKind::AlreadyExists,
        ErrorKind::ParentMissing,
        ErrorKind::FileTooLarge,
        ErrorKind::UploadTooLarge,
        ErrorKind::TreeTooDeep,
        ErrorKind::MissingAuth,
        ErrorKind::BadAuth,
        ErrorKind::InvalidToken,
        ErrorKind::Filesystem,
    ];

    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::NotADirectory | ErrorKind::Filesystem => Severity::Error,
            ErrorKind::MissingField
            | ErrorKind::MalformedDescriptor
            | ErrorKind::EndpointNotFound
            | ErrorKind::OutOfEndpoint
            | ErrorKind::NotFound
            | ErrorKind::PathIsDirectory
            | ErrorKind::AlreadyExists
            | ErrorKind::ParentMissing
            | ErrorKind::FileTooLarge
            | ErrorKind::UploadTooLarge
            | ErrorKind::TreeTooDeep
            | ErrorKind::MissingAuth
            | ErrorKind::BadAuth
            | ErrorKind::InvalidToken => Severity::Warn,
        }
    }
}

impl FsynError {
    /// Build a `map_err` closure that tags an io error with its path.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> FsynError {
        let path = path.as_ref().to_path_buf();
        move |source| FsynError::IoError { path, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsynError::MissingField { .. } => ErrorKind::MissingField,
            FsynError::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            FsynError::EndpointNotFound { .. } => ErrorKind::EndpointNotFound,
            FsynError::NotADirectory { .. } => ErrorKind::NotADirectory,
            FsynError::OutOfEndpoint { .. } => ErrorKind::OutOfEndpoint,
            FsynError::NotFound { .. } => ErrorKind::NotFound,
            FsynError::PathIsDirectory { .. } => ErrorKind::PathIsDirectory,
            FsynError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsynError::ParentMissing { .. } => ErrorKind::ParentMissing,
            FsynError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            FsynError::UploadTooLarge { .. } => ErrorKind::UploadTooLarge,
            FsynError::TreeTooDeep { .. } => ErrorKind::TreeTooDeep,
            FsynError::MissingAuth => ErrorKind::MissingAuth,
            FsynError::BadAuth { .. } => ErrorKind::BadAuth,
            FsynError::InvalidToken => ErrorKind::InvalidToken,
            FsynError::IoError { .. } | FsynError::Unrelatable { .. } => ErrorKind::Filesystem,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// The message shown to the caller.
    ///
    /// Server-side faults get an opaque message; the detail goes to the log
    /// through `Display`.
    pub fn user_message(&self) -> String {
        match self {
            FsynError::MissingField { field } => format!("{} is not specified", field),
            FsynError::MalformedDescriptor { .. } => "sent a bad file descriptor".to_string(),
            FsynError::EndpointNotFound { .. } => "endpoint not found".to_string(),
            FsynError::NotADirectory { .. } => "there is a problem with this endpoint".to_string(),
            FsynError::OutOfEndpoint { .. } => "path is outside of the endpoint".to_string(),
            FsynError::NotFound { .. } => "file not found".to_string(),
            FsynError::PathIsDirectory { .. } => "path is a dir".to_string(),
            FsynError::AlreadyExists { .. } => "file already exists".to_string(),
            FsynError::ParentMissing { detail, .. } => detail.to_string(),
            FsynError::FileTooLarge { .. } => "file is bigger than max hash size".to_string(),
            FsynError::UploadTooLarge { limit, .. } => {
                format!("upload is bigger than {} bytes", limit)
            }
            FsynError::TreeTooDeep { limit, .. } => {
                format!("directory tree is deeper than {} levels", limit)
            }
            FsynError::MissingAuth => "unauthorized".to_string(),
            FsynError::BadAuth { .. } => "bad authorization header".to_string(),
            FsynError::InvalidToken => "invalid token".to_string(),
            FsynError::IoError { .. } | FsynError::Unrelatable { .. } => {
                "internal server error happened".to_string()
            }
        }
    }
}

/// Errors raised while building the endpoint table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// An endpoint name is empty after trimming.
    #[error("endpoint name is empty")]
    EmptyName,

    /// Endpoint names are the first descriptor segment, so they cannot hold `/`.
    #[error("endpoint name '{name}' contains a path separator")]
    InvalidName { name: String },

    /// The same name was configured twice.
    #[error("endpoint '{name}' is configured more than once")]
    Duplicate { name: String },

    /// Endpoint roots must be absolute.
    #[error("endpoint '{name}' root {root} is not an absolute path")]
    RelativeRoot { name: String, root: PathBuf },
}

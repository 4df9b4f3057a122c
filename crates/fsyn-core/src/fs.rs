// fs.rs - Filesystem trait and the local-disk implementation.
//
// Operations talk to the disk only through `Filesystem`, so tests can
// substitute stubs (e.g. one whose reads always fail) without touching the
// real filesystem. `LocalFs` is the production implementation.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata the operations care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Metadata of the entry itself; symlinks are not followed.
    pub meta: EntryMeta,
}

/// Abstraction over the filesystem calls transfers make.
pub trait Filesystem: Send + Sync {
    /// Byte stream returned by [`Filesystem::open`].
    type Reader: Read + Send;

    /// Stat a path, following symlinks.
    fn metadata(&self, path: &Path) -> io::Result<EntryMeta>;

    /// List the immediate children of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> io::Result<Self::Reader>;

    /// Resolve symlinks and return the real absolute path.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Create a directory and all of its missing ancestors.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `body` to `path` so readers see either the old content or the
    /// complete new content, never a prefix.
    ///
    /// With `overwrite == false` an existing `path` fails with
    /// `io::ErrorKind::AlreadyExists`. Returns the number of bytes written.
    fn write_atomic(&self, path: &Path, body: &mut dyn Read, overwrite: bool) -> io::Result<u64>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

const UPLOAD_PREFIX: &str = ".fsyn-upload-";

/// True when an error means nothing exists at the path: either the path
/// is absent or one of its ancestors is a regular file.
pub fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

impl TryFrom<fs::Metadata> for EntryMeta {
    type Error = io::Error;

    fn try_from(meta: fs::Metadata) -> io::Result<Self> {
        Ok(Self {
            is_dir: meta.is_dir(),
            len: meta.len(),
            modified: Some(meta.modified()?),
        })
    }
}

impl Filesystem for LocalFs {
    type Reader = fs::File;

    fn metadata(&self, path: &Path) -> io::Result<EntryMeta> {
        EntryMeta::try_from(fs::metadata(path)?)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // `DirEntry::metadata` does not traverse symlinks.
            let meta = EntryMeta::try_from(entry.metadata()?)?;
            // Lossy conversion could fold two distinct names into one key.
            let name = entry.file_name().into_string().map_err(|raw| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file name {:?} is not valid UTF-8", raw),
                )
            })?;
            entries.push(DirEntry { name, meta });
        }
        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<fs::File> {
        fs::File::open(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, body: &mut dyn Read, overwrite: bool) -> io::Result<u64> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "upload target has no parent")
        })?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(UPLOAD_PREFIX);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o644));
        }

        // The temp file is deleted on drop, so an interrupted copy leaves
        // nothing behind.
        let mut staged = builder.tempfile_in(parent)?;
        let written = io::copy(body, staged.as_file_mut())?;
        staged.as_file_mut().flush()?;
        staged.as_file().sync_all()?;

        if overwrite {
            staged.persist(path).map_err(|e| e.error)?;
        } else {
            staged.persist_noclobber(path).map_err(|e| e.error)?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A body that yields some bytes, then fails.
    struct BrokenBody {
        sent: bool,
    }

    impl Read for BrokenBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
            }
            self.sent = true;
            let chunk = b"partial";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn read_dir_reports_names_and_kinds() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = LocalFs.read_dir(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert!(!entries[0].meta.is_dir);
        assert_eq!(entries[0].meta.len, 3);
        assert_eq!(entries[1].name, "sub");
        assert!(entries[1].meta.is_dir);
        assert!(entries[0].meta.modified.is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn read_dir_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff")), b"x").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfe")), b"y").unwrap();

        let err = LocalFs.read_dir(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn absent_covers_missing_and_file_ancestors() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        let missing = LocalFs.metadata(&dir.path().join("nope")).unwrap_err();
        assert!(is_absent(&missing));

        let under_file = LocalFs.metadata(&file.join("child")).unwrap_err();
        assert!(is_absent(&under_file));

        let other = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(!is_absent(&other));
    }

    #[test]
    fn write_atomic_creates_and_overwrites() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let n = LocalFs
            .write_atomic(&target, &mut &b"first"[..], false)
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(fs::read(&target).unwrap(), b"first");

        LocalFs
            .write_atomic(&target, &mut &b"second"[..], true)
            .unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn write_atomic_refuses_to_clobber_without_overwrite() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"keep me").unwrap();

        let err = LocalFs
            .write_atomic(&target, &mut &b"nope"[..], false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
    }

    #[test]
    fn failed_copy_leaves_target_and_directory_clean() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"original").unwrap();

        let result = LocalFs.write_atomic(&target, &mut BrokenBody { sent: false }, true);
        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"original");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(UPLOAD_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }
}

// digest.rs - xxHash64 content digests.
//
// Digests are for change detection and deduplication hints, not integrity:
// xxHash64 is chosen for throughput. The 8-byte result is rendered as 16
// lowercase hex characters, most significant byte first.

use std::hash::Hasher;
use std::io::{self, Read};
use std::path::Path;

use twox_hash::XxHash64;

use crate::error::FsynError;
use crate::fs::{is_absent, Filesystem};

/// Default hashing ceiling: 50 MiB.
pub const DEFAULT_MAX_HASH_SIZE: u64 = 50 * 1024 * 1024;

const SEED: u64 = 0;
const CHUNK: usize = 64 * 1024;

fn render(hasher: &XxHash64) -> String {
    format!("{:016x}", hasher.finish())
}

/// Hash in-memory bytes.
///
/// Same bytes, same digest, regardless of where they came from.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = XxHash64::with_seed(SEED);
    hasher.write(data);
    render(&hasher)
}

/// Hash everything a reader yields, in fixed-size chunks.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = XxHash64::with_seed(SEED);
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.write(&buf[..n]);
    }
    Ok(render(&hasher))
}

/// Hash a file on disk.
///
/// Directories are rejected before anything is opened. When `max_size > 0`
/// and the file is larger, this fails with `FileTooLarge` without opening
/// or reading the file. `max_size == 0` disables the ceiling.
pub fn hash_file<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    max_size: u64,
) -> Result<String, FsynError> {
    let meta = fs.metadata(path).map_err(|source| {
        if is_absent(&source) {
            FsynError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            FsynError::io(path)(source)
        }
    })?;

    if meta.is_dir {
        return Err(FsynError::PathIsDirectory {
            path: path.to_path_buf(),
        });
    }

    if max_size > 0 && meta.len > max_size {
        return Err(FsynError::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len,
            limit: max_size,
        });
    }

    let reader = fs.open(path).map_err(FsynError::io(path))?;
    hash_reader(reader).map_err(FsynError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fs::{DirEntry, EntryMeta, LocalFs};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    /// Reports one huge file and panics if anyone reads it.
    #[derive(Default)]
    struct NoReadFs {
        opened: AtomicBool,
    }

    struct ExplodingReader;

    impl Read for ExplodingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("file bytes must not be read");
        }
    }

    impl Filesystem for NoReadFs {
        type Reader = ExplodingReader;

        fn metadata(&self, _path: &Path) -> io::Result<EntryMeta> {
            Ok(EntryMeta {
                is_dir: false,
                len: 10 * 1024 * 1024 * 1024,
                modified: None,
            })
        }

        fn read_dir(&self, _path: &Path) -> io::Result<Vec<DirEntry>> {
            Ok(Vec::new())
        }

        fn open(&self, _path: &Path) -> io::Result<ExplodingReader> {
            self.opened.store(true, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::Other, "open is not allowed"))
        }

        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            Ok(path.to_path_buf())
        }

        fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        fn write_atomic(&self, _path: &Path, _body: &mut dyn Read, _o: bool) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn hash_known_value() {
        // XXH64("", seed 0)
        assert_eq!(hash_bytes(b""), "ef46db3751d8e999");
    }

    #[test]
    fn hash_is_sixteen_lowercase_hex_chars() {
        let hash = hash_bytes(b"I am totally normal");
        assert_eq!(hash.len(), 16);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn same_content_under_different_paths_hashes_the_same() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("nested").join("b.txt");
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let ha = hash_file(&LocalFs, &a, 0).unwrap();
        let hb = hash_file(&LocalFs, &b, 0).unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha, hash_bytes(b"same bytes"));
    }

    #[test]
    fn different_content_hashes_differently() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn chunked_reads_match_one_shot() {
        let data: Vec<u8> = (0..(CHUNK * 3 + 17)).map(|i| (i % 251) as u8).collect();
        assert_eq!(hash_reader(&data[..]).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn over_the_ceiling_fails_without_reading() {
        let fs = NoReadFs::default();
        let err = hash_file(&fs, Path::new("/big.iso"), 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileTooLarge);
        assert!(!fs.opened.load(Ordering::SeqCst));
    }

    #[test]
    fn directories_are_rejected() {
        let dir = tempdir().unwrap();
        let err = hash_file(&LocalFs, dir.path(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathIsDirectory);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = hash_file(&LocalFs, &dir.path().join("nope"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn ceiling_is_inclusive_and_zero_disables_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ten.bin");
        fs::write(&path, [7u8; 10]).unwrap();

        assert!(hash_file(&LocalFs, &path, 10).is_ok());
        assert!(hash_file(&LocalFs, &path, 0).is_ok());
        assert_eq!(
            hash_file(&LocalFs, &path, 9).unwrap_err().kind(),
            ErrorKind::FileTooLarge
        );
    }
}

//! PW-010: Streaming content digests (BLAKE3 or SHA-256), hex-encoded.

use crate::core::error::FileError;
use crate::core::types::{HashAlgorithm, TreeSnapshot};
use crate::tripwire::pool;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::warn;

const STREAM_BUF_SIZE: usize = 65536;

enum StreamHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
}

impl StreamHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hash a file's contents in fixed-size blocks. Returns lowercase hex.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, FileError> {
    let mut file = std::fs::File::open(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = StreamHasher::new(algorithm);
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Run a per-file read on a helper thread, giving up after `timeout`.
///
/// On expiry the helper is abandoned and finishes (or blocks) on its own.
pub fn with_timeout<T, F>(path: &Path, timeout: Option<Duration>, read: F) -> Result<T, FileError>
where
    T: Send + 'static,
    F: FnOnce(PathBuf) -> Result<T, FileError> + Send + 'static,
{
    let owned: PathBuf = path.to_path_buf();
    let Some(timeout) = timeout else {
        return read(owned);
    };

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read(owned));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(FileError::Timeout {
            path: path.to_path_buf(),
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Hash a file, giving up after `timeout`.
pub fn hash_file_with_timeout(
    path: &Path,
    algorithm: HashAlgorithm,
    timeout: Option<Duration>,
) -> Result<String, FileError> {
    with_timeout(path, timeout, move |p| hash_file(&p, algorithm))
}

/// Hash an in-memory buffer. Returns lowercase hex.
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Options shared by every tree-hashing pass.
#[derive(Debug, Clone, Copy)]
pub struct HashOptions {
    pub algorithm: HashAlgorithm,
    pub workers: usize,
    pub read_timeout: Option<Duration>,
}

impl HashOptions {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            workers: 0,
            read_timeout: None,
        }
    }
}

/// Hash every relative path under `root` on the worker pool.
///
/// Per-file failures land in `unreadable` and never abort the pass.
pub fn hash_tree<'a, I>(root: &Path, paths: I, opts: &HashOptions) -> TreeSnapshot
where
    I: IntoIterator<Item = &'a String>,
{
    let paths: Vec<&String> = paths.into_iter().collect();
    let results = pool::map_bounded(&paths, opts.workers, |rel| {
        hash_file_with_timeout(&root.join(rel.as_str()), opts.algorithm, opts.read_timeout)
    });

    let mut snapshot = TreeSnapshot::default();
    for (rel, result) in paths.into_iter().zip(results) {
        match result {
            Ok(digest) => {
                snapshot.digests.insert(rel.clone(), digest);
            }
            Err(e) => {
                warn!(path = %rel, error = %e, "cannot hash file");
                snapshot.unreadable.insert(rel.clone(), e.to_string());
            }
        }
    }
    snapshot
}

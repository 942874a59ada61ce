use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::models::{Fingerprint, FingerprintMethod, HashAlgo};

const BUF_SIZE: usize = 64 * 1024;

enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgo::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Streams the whole file through the digest in one forward pass.
pub fn hash_file(path: &Path, algo: HashAlgo) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algo);
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

fn surrogate(path: &Path, size: u64) -> io::Result<String> {
    let meta = fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:09}", d.as_secs(), d.subsec_nanos()))
        .unwrap_or_else(|_| "0".to_string());
    Ok(format!("size:{}:mtime:{}", size, mtime))
}

/// Content hash, or the size+mtime surrogate when `size_limit > 0` and the
/// file is larger than it. Callers map an error to [`Fingerprint::error`].
pub fn try_fingerprint(path: &Path, size_limit: u64, algo: HashAlgo) -> io::Result<Fingerprint> {
    let size = fs::metadata(path)?.len();
    if size_limit > 0 && size > size_limit {
        return Ok(Fingerprint {
            id: surrogate(path, size)?,
            method: FingerprintMethod::SizeSurrogate,
        });
    }
    Ok(Fingerprint {
        id: hash_file(path, algo)?,
        method: FingerprintMethod::ContentHash,
    })
}

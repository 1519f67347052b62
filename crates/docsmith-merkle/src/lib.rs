//! Merkle commitment over a directory of generated documentation.
//!
//! The commitment is a deterministic binary Merkle tree: leaves are the
//! SHA-256 of each file's bytes (lowercase hex), sorted lexicographically by
//! POSIX-normalized relative path; parents hash the concatenation of the two
//! child hex strings as ASCII. An odd node at any level is duplicated. A
//! single-leaf tree's root is that leaf; the empty tree's root is the empty
//! string. Any byte change in any committed file changes the root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use docsmith_core::{ExclusionFilter, MAX_FILE_SIZE};

/// File name of the persisted commitment artifact inside the output tree.
pub const ARTIFACT_NAME: &str = ".merkle.json";

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("invalid commitment artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One committed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleEntry {
    pub path: String,
    pub hash: String,
}

/// Root hash plus the ordered per-file hashes it commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleCommitment {
    #[serde(rename = "merkleRoot")]
    pub root: String,
    #[serde(rename = "fileHashes")]
    pub entries: Vec<MerkleEntry>,
}

impl MerkleCommitment {
    /// Commitment over no files.
    pub fn empty() -> Self {
        Self {
            root: String::new(),
            entries: Vec::new(),
        }
    }

    /// Build a commitment from `(path, leaf hash)` pairs. Entries are sorted
    /// by path; the root is derived from the sorted leaf order.
    pub fn from_entries(mut entries: Vec<MerkleEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let root = merkle_root(entries.iter().map(|e| e.hash.clone()).collect());
        Self { root, entries }
    }

    /// Whether `content` is the committed bytes for `path` under this root.
    pub fn verify_file(&self, path: &str, content: &[u8]) -> bool {
        let Some(entry) = self.entries.iter().find(|e| e.path == path) else {
            return false;
        };
        if entry.hash != hash_bytes(content) {
            return false;
        }
        // The leaf matches; the chain holds iff the recorded leaves still
        // reproduce the recorded root.
        merkle_root(self.entries.iter().map(|e| e.hash.clone()).collect()) == self.root
    }

    /// Write the `.merkle.json` artifact into `root_dir`.
    pub fn write_artifact(&self, root_dir: &Path) -> Result<PathBuf, MerkleError> {
        let path = root_dir.join(ARTIFACT_NAME);
        let json = serde_json::to_string_pretty(self).map_err(|source| MerkleError::Artifact {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| MerkleError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Read a previously written artifact.
    pub fn read_artifact(root_dir: &Path) -> Result<Self, MerkleError> {
        let path = root_dir.join(ARTIFACT_NAME);
        let raw = std::fs::read_to_string(&path).map_err(|source| MerkleError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| MerkleError::Artifact { path, source })
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reduce leaf hashes to the root. Parents hash the concatenated child hex
/// strings as ASCII, not the decoded bytes.
fn merkle_root(mut level: Vec<String>) -> String {
    if level.is_empty() {
        return String::new();
    }
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash_bytes(format!("{left}{right}").as_bytes()));
        }
        level = next;
    }
    level.pop().unwrap_or_default()
}

/// Compute the commitment over every committed file under `root`.
///
/// Excluded paths and files over the size cap are skipped; symlinks are
/// followed only when they resolve inside `root`. The artifact file itself
/// never participates.
pub fn compute_over_directory(
    root: &Path,
    filter: &ExclusionFilter,
) -> Result<MerkleCommitment, MerkleError> {
    let canonical_root = root.canonicalize().ok();
    let mut entries = Vec::new();

    for item in WalkDir::new(root).follow_links(true).into_iter().filter_entry(|e| {
        let rel = relative_posix(root, e.path());
        // Never descend into excluded directories.
        rel.is_empty() || !filter.is_excluded(&rel)
    }) {
        let item = item.map_err(|source| MerkleError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !item.file_type().is_file() {
            continue;
        }
        let rel = relative_posix(root, item.path());
        if rel.is_empty() || rel == ARTIFACT_NAME || filter.is_excluded(&rel) {
            continue;
        }
        if item.path_is_symlink() {
            if !resolves_inside(&canonical_root, item.path()) {
                debug!(path = %rel, "skipping symlink escaping the commitment root");
                continue;
            }
        }
        let metadata = item.metadata().map_err(|source| MerkleError::Walk {
            path: item.path().to_path_buf(),
            source,
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            debug!(path = %rel, size = metadata.len(), "skipping oversized file");
            continue;
        }
        let bytes = std::fs::read(item.path()).map_err(|source| MerkleError::Io {
            path: item.path().to_path_buf(),
            source,
        })?;
        entries.push(MerkleEntry {
            path: rel,
            hash: hash_bytes(&bytes),
        });
    }

    Ok(MerkleCommitment::from_entries(entries))
}

fn relative_posix(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn resolves_inside(canonical_root: &Option<PathBuf>, path: &Path) -> bool {
    let Some(root) = canonical_root else {
        return false;
    };
    match path.canonicalize() {
        Ok(resolved) => resolved.starts_with(root),
        Err(_) => false,
    }
}

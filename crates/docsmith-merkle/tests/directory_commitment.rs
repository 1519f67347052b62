//! Directory-level commitment behavior: determinism, exclusion, artifacts.

use std::fs;

use docsmith_core::ExclusionFilter;
use docsmith_merkle::{compute_over_directory, hash_bytes, MerkleCommitment, ARTIFACT_NAME};
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn recomputation_is_deterministic() {
    let dir = TempDir::new().unwrap();
    write(&dir, "intro.md", "# Intro");
    write(&dir, "chapters/one.md", "# One");
    write(&dir, "chapters/two.md", "# Two");

    let filter = ExclusionFilter::default_set();
    let first = compute_over_directory(dir.path(), &filter).unwrap();
    let second = compute_over_directory(dir.path(), &filter).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.entries.len(), 3);
}

#[test]
fn any_byte_change_changes_the_root() {
    let dir = TempDir::new().unwrap();
    write(&dir, "intro.md", "# Intro");
    write(&dir, "outro.md", "# Outro");

    let filter = ExclusionFilter::default_set();
    let before = compute_over_directory(dir.path(), &filter).unwrap();

    write(&dir, "outro.md", "# Outro!");
    let after = compute_over_directory(dir.path(), &filter).unwrap();
    assert_ne!(before.root, after.root);
}

#[test]
fn three_file_root_follows_the_pairwise_reduction() {
    let dir = TempDir::new().unwrap();
    write(&dir, "A.md", "alpha");
    write(&dir, "B.md", "beta");
    write(&dir, "C.md", "gamma");

    let ha = hash_bytes(b"alpha");
    let hb = hash_bytes(b"beta");
    let hc = hash_bytes(b"gamma");
    let hab = hash_bytes(format!("{ha}{hb}").as_bytes());
    let hcc = hash_bytes(format!("{hc}{hc}").as_bytes());
    let expected = hash_bytes(format!("{hab}{hcc}").as_bytes());

    let commitment =
        compute_over_directory(dir.path(), &ExclusionFilter::default_set()).unwrap();
    assert_eq!(commitment.root, expected);

    let paths: Vec<_> = commitment.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["A.md", "B.md", "C.md"]);
}

#[test]
fn excluded_paths_never_enter_the_commitment() {
    let dir = TempDir::new().unwrap();
    write(&dir, "index.md", "# Index");
    write(&dir, "node_modules/pkg/readme.md", "dependency");
    write(&dir, ".git/config", "[core]");
    write(&dir, "logo.png", "not really an image");

    let commitment =
        compute_over_directory(dir.path(), &ExclusionFilter::default_set()).unwrap();
    assert_eq!(commitment.entries.len(), 1);
    assert_eq!(commitment.entries[0].path, "index.md");
}

#[test]
fn empty_directory_commits_to_the_empty_string() {
    let dir = TempDir::new().unwrap();
    let commitment =
        compute_over_directory(dir.path(), &ExclusionFilter::default_set()).unwrap();
    assert_eq!(commitment, MerkleCommitment::empty());
}

#[test]
fn artifact_roundtrips_and_is_not_self_committed() {
    let dir = TempDir::new().unwrap();
    write(&dir, "doc.md", "# Doc");

    let filter = ExclusionFilter::default_set();
    let commitment = compute_over_directory(dir.path(), &filter).unwrap();
    commitment.write_artifact(dir.path()).unwrap();

    let loaded = MerkleCommitment::read_artifact(dir.path()).unwrap();
    assert_eq!(loaded, commitment);

    // Recomputing after the artifact lands must not change the root.
    let recomputed = compute_over_directory(dir.path(), &filter).unwrap();
    assert_eq!(recomputed.root, commitment.root);
    assert!(recomputed.entries.iter().all(|e| e.path != ARTIFACT_NAME));
}

#[test]
fn artifact_uses_the_wire_field_names() {
    let dir = TempDir::new().unwrap();
    write(&dir, "doc.md", "# Doc");

    let commitment =
        compute_over_directory(dir.path(), &ExclusionFilter::default_set()).unwrap();
    commitment.write_artifact(dir.path()).unwrap();

    let raw = fs::read_to_string(dir.path().join(ARTIFACT_NAME)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(json.get("merkleRoot").is_some());
    assert!(json["fileHashes"].as_array().is_some());
    assert_eq!(json["fileHashes"][0]["path"], "doc.md");
}

#[test]
fn verify_file_agrees_with_compute() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.md", "aaa");
    write(&dir, "b.md", "bbb");

    let commitment =
        compute_over_directory(dir.path(), &ExclusionFilter::default_set()).unwrap();
    assert!(commitment.verify_file("a.md", b"aaa"));
    assert!(commitment.verify_file("b.md", b"bbb"));
    assert!(!commitment.verify_file("a.md", b"bbb"));
}

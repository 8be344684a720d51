//! Git remote fixtures.
//!
//! Everything is built with `git2`, so tests do not depend on a `git`
//! binary being installed.

use std::fs;
use std::path::Path;

use git2::{IndexAddOption, Repository, Signature};

/// Branch every seeded remote uses.
pub const BRANCH: &str = "main";

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("signature: failed to build test signature: {e}"))
}

/// Initialises an empty bare repository whose HEAD names `main`.
///
/// Realism level: **EMPTY REMOTE**: no commits, no branches.
///
/// # Panics
/// Panics if the repository cannot be created.
pub fn empty_remote(path: &Path) -> Repository {
    let repo = Repository::init_bare(path).unwrap_or_else(|e| {
        panic!(
            "empty_remote: failed to init bare repository at {}: {e}",
            path.display()
        )
    });
    repo.set_head(&format!("refs/heads/{BRANCH}"))
        .unwrap_or_else(|e| panic!("empty_remote: failed to set HEAD: {e}"));
    repo
}

/// Initialises a bare repository with one commit (`README.md`) on `main`.
///
/// Realism level: **REMOTE WITH HISTORY**: what a freshly created hosted
/// repository looks like.
///
/// # Panics
/// Panics if any git operation fails.
pub fn seeded_remote(path: &Path) -> Repository {
    let repo = empty_remote(path);
    {
        let blob = repo
            .blob(b"# Backup data\n")
            .unwrap_or_else(|e| panic!("seeded_remote: failed to write blob: {e}"));
        let mut builder = repo
            .treebuilder(None)
            .unwrap_or_else(|e| panic!("seeded_remote: failed to create tree: {e}"));
        builder
            .insert("README.md", blob, 0o100644)
            .unwrap_or_else(|e| panic!("seeded_remote: failed to insert README: {e}"));
        let tree_id = builder
            .write()
            .unwrap_or_else(|e| panic!("seeded_remote: failed to write tree: {e}"));
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = signature();
        repo.commit(
            Some(&format!("refs/heads/{BRANCH}")),
            &sig,
            &sig,
            "Initial commit",
            &tree,
            &[],
        )
        .unwrap_or_else(|e| panic!("seeded_remote: failed to commit: {e}"));
    }
    repo
}

/// Number of commits reachable from `main` in `repo`.
pub fn commit_count(repo: &Repository) -> usize {
    let Ok(reference) = repo.find_reference(&format!("refs/heads/{BRANCH}")) else {
        return 0;
    };
    let mut walk = repo.revwalk().unwrap();
    walk.push(reference.target().unwrap()).unwrap();
    walk.count()
}

/// Id of the tip of `main`, if the branch exists.
pub fn tip(repo: &Repository) -> Option<git2::Oid> {
    repo.find_reference(&format!("refs/heads/{BRANCH}"))
        .ok()
        .and_then(|r| r.target())
}

/// Commit `files` (relative path, content) to `main` of the bare `remote`
/// through a scratch clone, the way another machine would.
///
/// # Panics
/// Panics if any git operation fails.
pub fn push_from_other_machine(remote: &Path, files: &[(&str, &str)]) {
    let scratch = tempfile::TempDir::new().unwrap();
    let repo = Repository::clone(&remote.to_string_lossy(), scratch.path())
        .unwrap_or_else(|e| panic!("push_from_other_machine: clone failed: {e}"));

    for (rel, content) in files {
        let path = scratch.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    let sig = signature();
    repo.commit(Some("HEAD"), &sig, &sig, "Other machine", &tree, &[&parent])
        .unwrap();

    let mut origin = repo.find_remote("origin").unwrap();
    let refspec = format!("refs/heads/{BRANCH}:refs/heads/{BRANCH}");
    origin
        .push(&[refspec.as_str()], None)
        .unwrap_or_else(|e| panic!("push_from_other_machine: push failed: {e}"));
}

/// Content of `rel` in the tip commit of `main`, if present.
pub fn read_file(repo: &Repository, rel: &str) -> Option<String> {
    let tip = tip(repo)?;
    let tree = repo.find_commit(tip).ok()?.tree().ok()?;
    let entry = tree.get_path(Path::new(rel)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    Some(String::from_utf8_lossy(blob.content()).into_owned())
}

/// Paths of all files in the tip commit of `main`, sorted.
pub fn tracked_files(repo: &Repository) -> Vec<String> {
    let Some(tip) = tip(repo) else {
        return Vec::new();
    };
    let tree = repo.find_commit(tip).unwrap().tree().unwrap();
    let mut files = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(git2::ObjectType::Blob) {
            files.push(format!("{dir}{}", entry.name().unwrap_or_default()));
        }
        git2::TreeWalkResult::Ok
    })
    .unwrap();
    files.sort();
    files
}

/// First line of the tip commit message of `main`.
pub fn tip_message(repo: &Repository) -> String {
    let tip = tip(repo).unwrap();
    let commit = repo.find_commit(tip).unwrap();
    commit.summary().unwrap_or_default().to_string()
}

/// Note attached to the tip of `main` under `refs/notes/commits`.
pub fn tip_note(repo: &Repository) -> Option<String> {
    let tip = tip(repo)?;
    let note = repo.find_note(Some("refs/notes/commits"), tip).ok()?;
    note.message().map(str::to_string)
}

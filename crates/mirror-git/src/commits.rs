//! Annotation inspection.

use git2::{ErrorCode, Oid, Repository};

use crate::Result;
use crate::checkout::NOTES_REF;

/// Read the annotation attached to `commit`, if there is one.
pub fn read_note(repo: &Repository, commit: Oid) -> Result<Option<String>> {
    match repo.find_note(Some(NOTES_REF), commit) {
        Ok(note) => Ok(note.message().map(str::to_string)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

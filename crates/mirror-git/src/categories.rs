//! Change-category classification of a staged diff
//!
//! Every commit is labelled with the kinds of change it carries, e.g.
//! `"Added Modified"`. The label is used verbatim in the commit message and
//! in the note attached to the commit.

use std::collections::BTreeSet;
use std::fmt;

use git2::{Delta, Diff};

/// One kind of staged change.
///
/// Variant order is the output order of [`CategorySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeCategory {
    Added,
    Deleted,
    Renamed,
    Modified,
    TypeChanged,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 5] = [
        ChangeCategory::Added,
        ChangeCategory::Deleted,
        ChangeCategory::Renamed,
        ChangeCategory::Modified,
        ChangeCategory::TypeChanged,
    ];

    /// Map a libgit2 delta status. Unchanged, ignored and similar statuses
    /// carry no category.
    pub fn from_delta(delta: Delta) -> Option<Self> {
        match delta {
            Delta::Added | Delta::Copied => Some(Self::Added),
            Delta::Deleted => Some(Self::Deleted),
            Delta::Renamed => Some(Self::Renamed),
            Delta::Modified => Some(Self::Modified),
            Delta::Typechange => Some(Self::TypeChanged),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::Modified => "Modified",
            Self::TypeChanged => "TypeChanged",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The categories present in one staged diff, in fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet {
    present: BTreeSet<ChangeCategory>,
}

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: ChangeCategory) {
        self.present.insert(category);
    }

    pub fn contains(&self, category: ChangeCategory) -> bool {
        self.present.contains(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Categories in `Added, Deleted, Renamed, Modified, TypeChanged` order.
    pub fn iter(&self) -> impl Iterator<Item = ChangeCategory> + '_ {
        self.present.iter().copied()
    }
}

impl FromIterator<ChangeCategory> for CategorySet {
    fn from_iter<I: IntoIterator<Item = ChangeCategory>>(iter: I) -> Self {
        Self {
            present: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for category in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(category.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Classify a staged diff (old side: last commit, new side: index).
///
/// Rename detection must already have run on `diff` for `Renamed` to show up.
pub fn classify(diff: &Diff<'_>) -> CategorySet {
    classify_deltas(diff.deltas().map(|d| d.status()))
}

/// Classify a sequence of delta statuses.
pub fn classify_deltas(deltas: impl IntoIterator<Item = Delta>) -> CategorySet {
    deltas
        .into_iter()
        .filter_map(ChangeCategory::from_delta)
        .collect()
}

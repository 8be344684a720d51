//! Version-control layer for mirror-sync
//!
//! Exposes the [`VersionedStore`] capability, its libgit2 implementation
//! [`GitCheckout`], and the change-category classifier used to label commits.

pub mod categories;
pub mod checkout;
pub mod commits;
pub mod credentials;
pub mod error;
pub mod store;

pub use categories::{CategorySet, ChangeCategory, classify};
pub use checkout::GitCheckout;
pub use credentials::{AuthMethod, Credentials, Remote};
pub use error::{Error, Result};
pub use store::{ResetOutcome, VersionedStore};

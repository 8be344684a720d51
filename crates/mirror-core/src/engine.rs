//! One synchronization cycle
//!
//! ```text
//! Opened -> ResetToRemote -> Staged -> CommittedAndPushed
//!                                   \-> NoOp
//! ```
//!
//! The remote is the single source of truth. Every cycle starts by hard
//! resetting to it, which discards local commits that were never pushed. A
//! failed push is therefore retried implicitly: the next cycle re-mirrors the
//! sources on top of the remote state and commits the same content again.

use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone};
use mirror_fs::{CopyEngine, MirrorCopy};
use mirror_git::{CategorySet, GitCheckout, ResetOutcome, VersionedStore};

use crate::Result;
use crate::config::SyncConfig;
use crate::layout::{self, CheckoutLayout};
use crate::machine::MachineIdentity;
use crate::registry::{LinkEntry, LinkRegistry};
use crate::replace::{BulkReplaceCoordinator, SkippedSource};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A commit was created and pushed
    Committed {
        commit: String,
        categories: CategorySet,
    },
    /// Nothing changed since the last commit
    NoOp,
}

/// Report from [`Synchronizer::run_cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Sources mirrored into their slots
    pub mirrored: Vec<LinkEntry>,
    /// Sources skipped this cycle, slots kept
    pub skipped: Vec<SkippedSource>,
    /// Links dropped because their source left the configuration. Always
    /// empty without machine namespacing, where the registry is shared.
    pub removed: Vec<LinkEntry>,
}

impl CycleReport {
    pub fn is_noop(&self) -> bool {
        self.outcome == CycleOutcome::NoOp
    }
}

/// Drives a [`VersionedStore`] through one mirror-and-commit cycle.
///
/// At most one cycle may run against a checkout at a time; callers hold a
/// [`mirror_fs::FileLock`] on [`layout::lock_path`] for the duration.
pub struct Synchronizer<S: VersionedStore> {
    store: S,
    layout: CheckoutLayout,
    sources: Vec<PathBuf>,
    engine: Box<dyn MirrorCopy>,
    staging_parent: Option<PathBuf>,
    verbose: bool,
}

impl<S: VersionedStore + std::fmt::Debug> std::fmt::Debug for Synchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("store", &self.store)
            .field("layout", &self.layout)
            .field("sources", &self.sources)
            .field("staging_parent", &self.staging_parent)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Synchronizer<GitCheckout> {
    /// Validate `config`, then open or clone its checkout.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        let remote = config.remote()?;
        let install_root = config.install_root()?;
        let staging_parent = config.staging_root()?;

        let machine = if config.namespace_by_machine {
            let machine = MachineIdentity::detect()?;
            tracing::debug!(machine = %machine, "Namespacing replica by machine");
            Some(machine)
        } else {
            None
        };

        let checkout_dir = layout::checkout_dir(&install_root, &config.credentials);
        let store = GitCheckout::open_or_clone(remote, &checkout_dir, config.branch.as_deref())?;
        tracing::info!(checkout = %checkout_dir.display(), branch = %store.branch(), "Opened checkout");

        Ok(Self::new(store, machine, config.paths_sync.clone(), config.copy_engine)
            .with_staging_parent(staging_parent))
    }
}

impl<S: VersionedStore> Synchronizer<S> {
    /// Synchronizer over an already opened store.
    pub fn new(
        store: S,
        machine: Option<MachineIdentity>,
        sources: Vec<PathBuf>,
        engine: CopyEngine,
    ) -> Self {
        let layout = CheckoutLayout::new(store.workdir(), machine);
        Self {
            store,
            layout,
            sources,
            engine: engine.build(),
            staging_parent: None,
            verbose: false,
        }
    }

    /// Use a specific mirror implementation.
    pub fn with_engine(mut self, engine: Box<dyn MirrorCopy>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_staging_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.staging_parent = parent;
        self
    }

    /// Log every transferred or deleted path.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &CheckoutLayout {
        &self.layout
    }

    /// Run one full cycle.
    ///
    /// # Errors
    ///
    /// Any failure before the commit aborts the cycle with the checkout left
    /// as is; the next cycle starts over from the remote state. A push
    /// failure is returned after the local commit was created. Annotation
    /// failures are only logged.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        match self.store.reset_to_remote()? {
            ResetOutcome::Reset { commit } => {
                tracing::info!(branch = %self.store.branch(), commit = %commit, "Reset to remote");
            }
            ResetOutcome::RemoteEmpty => {
                tracing::info!(branch = %self.store.branch(), "Remote is empty, starting history");
            }
        }

        let mut registry = LinkRegistry::load(self.layout.registry_path())?;
        // A shared registry also holds other machines' links, which this
        // machine's configuration knows nothing about
        let removed = if self.layout.machine().is_some() {
            registry.retain_configured(&self.sources)?
        } else {
            Vec::new()
        };
        for entry in &removed {
            tracing::info!(
                source = %entry.source.display(),
                slot = %entry.slot.display(),
                "Source no longer configured, pruning its slot"
            );
        }
        for source in &self.sources {
            registry.resolve_or_create(source)?;
        }
        if registry.is_dirty() {
            registry.persist()?;
        }

        let replace = BulkReplaceCoordinator::new(self.engine.as_ref())
            .with_staging_parent(self.staging_parent.clone())
            .with_verbose(self.verbose)
            .replace_all(&registry, &self.layout.replica_dir())?;

        self.store.stage_all()?;
        let categories = self.store.staged_categories()?;
        tracing::info!(categories = %categories, "Staged");

        let outcome = if categories.is_empty() {
            tracing::info!("No changes, nothing to commit");
            CycleOutcome::NoOp
        } else {
            let message = commit_message(&Local::now(), &categories);
            let commit = self.store.commit(&message)?;
            tracing::info!(commit = %commit, "Committed");

            self.store.push()?;
            tracing::info!(branch = %self.store.branch(), "Pushed");

            if let Err(e) = self.annotate(&commit, &categories) {
                tracing::warn!(commit = %commit, error = %e, "Could not publish commit annotation");
            }
            CycleOutcome::Committed { commit, categories }
        };

        Ok(CycleReport {
            outcome,
            mirrored: replace.mirrored,
            skipped: replace.skipped,
            removed,
        })
    }

    fn annotate(&mut self, commit: &str, categories: &CategorySet) -> mirror_git::Result<()> {
        // Notes written by other machines must survive our push
        self.store.fetch_annotations()?;
        self.store.annotate(commit, &categories.to_string())?;
        self.store.push_annotations()
    }
}

/// `[2024-05-01 12:00:00] - Automatic commit: [Added Modified] files.`
pub fn commit_message<Tz: TimeZone>(timestamp: &DateTime<Tz>, categories: &CategorySet) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[{}] - Automatic commit: [{categories}] files.",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    )
}

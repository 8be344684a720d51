//! Full cycles against a local bare remote, one machine.

use std::fs;
use std::path::{Path, PathBuf};

use mirror_core::{CycleOutcome, CycleReport, MachineIdentity, SyncConfig, Synchronizer};
use mirror_fs::CopyEngine;
use mirror_git::{GitCheckout, Remote};
use mirror_test_utils::env::TestEnv;
use mirror_test_utils::git::{self, BRANCH};
use pretty_assertions::assert_eq;

fn cycle(config: &Path) -> CycleReport {
    let config = SyncConfig::load(config).unwrap();
    Synchronizer::from_config(&config)
        .unwrap()
        .run_cycle()
        .unwrap()
}

fn categories(report: &CycleReport) -> String {
    match &report.outcome {
        CycleOutcome::Committed { categories, .. } => categories.to_string(),
        CycleOutcome::NoOp => panic!("expected a commit, cycle was a no-op"),
    }
}

fn slot_files(remote: &git2::Repository, slot: &Path) -> Vec<String> {
    let prefix = format!("data/{}/", slot.display());
    git::tracked_files(remote)
        .into_iter()
        .filter_map(|f| f.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

#[test]
fn added_then_deleted() {
    let env = TestEnv::seeded();
    env.write_source("project/a.txt", "alpha");
    let b = env.write_source("project/b.txt", "beta");
    let config = env.write_config(&[env.sources().join("project")]);

    let first = cycle(&config);
    assert_eq!(categories(&first), "Added");
    let slot = first.mirrored[0].slot.clone();
    let remote = env.remote_repo();
    assert_eq!(slot_files(&remote, &slot), vec!["a.txt", "b.txt"]);
    let after_first = git::commit_count(&remote);

    fs::remove_file(b).unwrap();
    let second = cycle(&config);

    assert_eq!(categories(&second), "Deleted");
    assert_eq!(git::commit_count(&env.remote_repo()), after_first + 1);
    assert_eq!(slot_files(&env.remote_repo(), &slot), vec!["a.txt"]);
    assert_eq!(git::tip_note(&env.remote_repo()).as_deref(), Some("Deleted"));
}

#[test]
fn unchanged_sources_do_not_commit() {
    let env = TestEnv::seeded();
    env.write_source("project/a.txt", "alpha");
    let config = env.write_config(&[env.sources().join("project")]);
    cycle(&config);
    let tip = git::tip(&env.remote_repo());

    let report = cycle(&config);

    assert!(report.is_noop());
    assert_eq!(git::tip(&env.remote_repo()), tip);
}

#[test]
fn missing_source_keeps_backed_up_data() {
    let env = TestEnv::seeded();
    env.write_source("usb/photo.jpg", "pixels");
    env.write_source("home/todo.txt", "milk");
    let usb = env.sources().join("usb");
    let home = env.sources().join("home");
    let config = env.write_config(&[usb.clone(), home.clone()]);
    let first = cycle(&config);
    let usb_slot = slot_for(&first, &usb);

    // Drive unplugged, unrelated edit elsewhere
    fs::rename(&usb, env.root().join("unplugged")).unwrap();
    env.write_source("home/todo.txt", "milk, eggs");
    let second = cycle(&config);

    assert_eq!(categories(&second), "Modified");
    assert_eq!(second.skipped.len(), 1);
    assert_eq!(
        git::read_file(
            &env.remote_repo(),
            &format!("data/{}/photo.jpg", usb_slot.display())
        )
        .as_deref(),
        Some("pixels")
    );
}

fn namespaced_cycle(env: &TestEnv, sources: &[PathBuf]) -> CycleReport {
    let checkout = GitCheckout::open_or_clone(
        Remote::local(env.remote()),
        &env.install().join("laptop"),
        Some(BRANCH),
    )
    .unwrap();
    Synchronizer::new(
        checkout,
        Some(MachineIdentity::from_raw("laptop")),
        sources.to_vec(),
        CopyEngine::Native,
    )
    .run_cycle()
    .unwrap()
}

#[test]
fn unconfigured_source_is_pruned() {
    let env = TestEnv::seeded();
    env.write_source("keep/a.txt", "a");
    env.write_source("drop/b.txt", "b");
    let keep = env.sources().join("keep");
    let drop = env.sources().join("drop");
    let id = MachineIdentity::from_raw("laptop");
    let first = namespaced_cycle(&env, &[keep.clone(), drop.clone()]);
    let drop_slot = slot_for(&first, &drop);

    let second = namespaced_cycle(&env, &[keep]);

    assert_eq!(second.removed.len(), 1);
    assert_eq!(categories(&second), "Deleted Modified");
    let remote = env.remote_repo();
    let prefix = format!("data/{id}/{}/", drop_slot.display());
    assert!(
        git::tracked_files(&remote)
            .iter()
            .all(|f| !f.starts_with(&prefix))
    );
    let registry = git::read_file(&remote, &format!("links/{id}.yml")).unwrap();
    assert!(!registry.contains(&drop_slot.display().to_string()));
}

#[test]
fn unconfigured_source_stays_in_shared_registry() {
    let env = TestEnv::seeded();
    env.write_source("keep/a.txt", "a");
    env.write_source("other/b.txt", "b");
    let keep = env.sources().join("keep");
    let other = env.sources().join("other");
    let config = env.write_config(&[keep.clone(), other.clone()]);
    let first = cycle(&config);
    let other_slot = slot_for(&first, &other);

    let config = env.write_config(&[keep]);
    let second = cycle(&config);

    assert!(second.removed.is_empty());
    assert_eq!(slot_files(&env.remote_repo(), &other_slot), vec!["b.txt"]);
    let registry = git::read_file(&env.remote_repo(), "links.yml").unwrap();
    assert!(registry.contains(&other_slot.display().to_string()));
}

#[cfg(unix)]
#[test]
fn symlinked_source_keeps_its_slot_while_target_is_gone() {
    let env = TestEnv::seeded();
    env.write_source("usb/photo.jpg", "pixels");
    let usb = env.sources().join("usb");
    let link = env.root().join("photos");
    std::os::unix::fs::symlink(&usb, &link).unwrap();
    let config = env.write_config(&[link.clone()]);
    let first = cycle(&config);
    let slot = first.mirrored[0].slot.clone();

    // Drive unplugged, the link now dangles
    fs::rename(&usb, env.root().join("unplugged")).unwrap();
    let second = cycle(&config);

    assert!(second.removed.is_empty());
    assert_eq!(second.skipped.len(), 1);
    assert_eq!(slot_files(&env.remote_repo(), &slot), vec!["photo.jpg"]);

    // Drive back, same slot
    fs::rename(env.root().join("unplugged"), &usb).unwrap();
    env.write_source("usb/photo.jpg", "more pixels");
    let third = cycle(&config);
    assert_eq!(third.mirrored[0].slot, slot);
    assert_eq!(categories(&third), "Modified");
}

#[test]
fn relative_source_resolves_against_config_dir() {
    let env = TestEnv::seeded();
    env.write_source("project/a.txt", "alpha");
    let config = env.write_config(&[PathBuf::from("sources/project")]);

    let report = cycle(&config);

    assert_eq!(
        report.mirrored[0].source,
        mirror_fs::canonicalize(env.sources().join("project")).unwrap()
    );
    assert_eq!(slot_files(&env.remote_repo(), &report.mirrored[0].slot), vec!["a.txt"]);
}

#[test]
fn single_file_source() {
    let env = TestEnv::seeded();
    let rc = env.write_source("dotfiles/.bashrc", "export EDITOR=vi\n");
    let config = env.write_config(&[rc.clone()]);

    let report = cycle(&config);

    let slot = slot_for(&report, &rc);
    assert!(slot.display().to_string().starts_with(".bashrc_"));
    assert_eq!(
        git::read_file(
            &env.remote_repo(),
            &format!("data/{}/.bashrc", slot.display())
        )
        .as_deref(),
        Some("export EDITOR=vi\n")
    );
}

#[test]
fn changes_from_another_machine_are_kept() {
    let env = TestEnv::seeded();
    env.write_source("project/a.txt", "alpha");
    let config = env.write_config(&[env.sources().join("project")]);
    cycle(&config);

    git::push_from_other_machine(&env.remote(), &[("NOTES.md", "written elsewhere")]);
    env.write_source("project/a.txt", "alpha 2");
    cycle(&config);

    let remote = env.remote_repo();
    assert_eq!(
        git::read_file(&remote, "NOTES.md").as_deref(),
        Some("written elsewhere")
    );
    assert!(git::tip_message(&remote).ends_with("Automatic commit: [Modified] files."));
}

#[test]
fn unpushed_local_commit_is_discarded() {
    let env = TestEnv::seeded();
    env.write_source("project/a.txt", "alpha");
    let config = env.write_config(&[env.sources().join("project")]);
    let first = cycle(&config);
    let CycleOutcome::Committed { commit, .. } = first.outcome else {
        panic!("expected a commit");
    };

    // A stray local commit, as left behind by a failed push
    let checkout = checkout_dir(&env);
    fs::write(checkout.join("stray.txt"), "local only").unwrap();
    let repo = git2::Repository::open(&checkout).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("stray.txt")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    let sig = git2::Signature::now("Test User", "test@test.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "stray", &tree, &[&parent])
        .unwrap();

    let report = cycle(&config);

    assert!(report.is_noop());
    assert_eq!(git::tip(&env.remote_repo()).unwrap().to_string(), commit);
    assert_eq!(
        repo.head().unwrap().target().unwrap().to_string(),
        commit
    );
}

fn slot_for(report: &CycleReport, source: &Path) -> PathBuf {
    let source = mirror_fs::canonicalize(source).unwrap();
    report
        .mirrored
        .iter()
        .find(|e| e.source == source)
        .map(|e| e.slot.clone())
        .unwrap()
}

fn checkout_dir(env: &TestEnv) -> PathBuf {
    let config = SyncConfig::load(&env.root().join("config.yml")).unwrap();
    mirror_core::checkout_dir(&config.install_root().unwrap(), &config.credentials)
}

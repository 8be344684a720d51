//! Several machines sharing one remote.

use mirror_core::{CycleReport, MachineIdentity, Synchronizer};
use mirror_fs::CopyEngine;
use mirror_git::commits::read_note;
use mirror_git::{GitCheckout, Remote};
use mirror_test_utils::env::TestEnv;
use mirror_test_utils::git::{self, BRANCH};
use pretty_assertions::assert_eq;

fn machine_cycle(env: &TestEnv, name: &str, source: &str) -> CycleReport {
    sync_from(env, name, Some(MachineIdentity::from_raw(name)), source)
}

fn sync_from(
    env: &TestEnv,
    checkout_name: &str,
    machine: Option<MachineIdentity>,
    source: &str,
) -> CycleReport {
    let checkout = GitCheckout::open_or_clone(
        Remote::local(env.remote()),
        &env.install().join(checkout_name),
        Some(BRANCH),
    )
    .unwrap();
    let sources = vec![env.sources().join(source)];

    Synchronizer::new(checkout, machine, sources, CopyEngine::Native)
        .run_cycle()
        .unwrap()
}

fn replica_file(env: &TestEnv, machine: &str, report: &CycleReport, file: &str) -> Option<String> {
    let id = MachineIdentity::from_raw(machine);
    let slot = report.mirrored[0].slot.display();
    git::read_file(&env.remote_repo(), &format!("data/{id}/{slot}/{file}"))
}

fn slot_of<'r>(report: &'r CycleReport, source: &str) -> &'r std::path::Path {
    report
        .mirrored
        .iter()
        .find(|e| e.source.ends_with(source))
        .map(|e| e.slot.as_path())
        .unwrap()
}

#[test]
fn machines_do_not_prune_each_other() {
    let env = TestEnv::seeded();
    env.write_source("laptop/a.txt", "from laptop");
    env.write_source("desktop/b.txt", "from desktop");

    let laptop = machine_cycle(&env, "laptop", "laptop");
    let desktop = machine_cycle(&env, "desktop", "desktop");

    assert_eq!(
        replica_file(&env, "laptop", &laptop, "a.txt").as_deref(),
        Some("from laptop")
    );
    assert_eq!(
        replica_file(&env, "desktop", &desktop, "b.txt").as_deref(),
        Some("from desktop")
    );

    let laptop_registry = format!("links/{}.yml", MachineIdentity::from_raw("laptop"));
    let desktop_registry = format!("links/{}.yml", MachineIdentity::from_raw("desktop"));
    let remote = env.remote_repo();
    assert!(git::read_file(&remote, &laptop_registry).is_some());
    assert!(git::read_file(&remote, &desktop_registry).is_some());
}

#[test]
fn notes_from_both_machines_survive() {
    let env = TestEnv::seeded();
    env.write_source("laptop/a.txt", "from laptop");
    env.write_source("desktop/b.txt", "from desktop");

    let laptop = machine_cycle(&env, "laptop", "laptop");
    machine_cycle(&env, "desktop", "desktop");

    let remote = env.remote_repo();
    let mirror_core::CycleOutcome::Committed { commit, .. } = laptop.outcome else {
        panic!("laptop cycle should commit");
    };
    let oid = git2::Oid::from_str(&commit).unwrap();
    assert_eq!(read_note(&remote, oid).unwrap().as_deref(), Some("Added"));
    assert_eq!(git::tip_note(&remote).as_deref(), Some("Added"));
}

#[test]
fn second_machine_cycle_after_first_is_noop() {
    let env = TestEnv::seeded();
    env.write_source("laptop/a.txt", "from laptop");
    env.write_source("desktop/b.txt", "from desktop");
    machine_cycle(&env, "laptop", "laptop");
    machine_cycle(&env, "desktop", "desktop");

    // Laptop picks up the desktop commit, has nothing new of its own
    let again = machine_cycle(&env, "laptop", "laptop");

    assert!(again.is_noop());
}

#[test]
fn shared_registry_keeps_other_machines_slots() {
    let env = TestEnv::seeded();
    env.write_source("laptop/a.txt", "from laptop");
    env.write_source("desktop/b.txt", "from desktop");

    let laptop = sync_from(&env, "laptop", None, "laptop");
    let desktop = sync_from(&env, "desktop", None, "desktop");
    let again = sync_from(&env, "laptop", None, "laptop");

    assert!(desktop.removed.is_empty());
    assert!(again.removed.is_empty());
    let remote = env.remote_repo();
    let laptop_slot = slot_of(&laptop, "laptop").display();
    let desktop_slot = slot_of(&desktop, "desktop").display();
    assert_eq!(
        git::read_file(&remote, &format!("data/{laptop_slot}/a.txt")).as_deref(),
        Some("from laptop")
    );
    assert_eq!(
        git::read_file(&remote, &format!("data/{desktop_slot}/b.txt")).as_deref(),
        Some("from desktop")
    );
    let registry = git::read_file(&remote, "links.yml").unwrap();
    assert!(registry.contains(&laptop_slot.to_string()));
    assert!(registry.contains(&desktop_slot.to_string()));
}

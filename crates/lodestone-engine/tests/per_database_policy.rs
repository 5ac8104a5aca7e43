//! End-to-end scenarios over on-disk policy files: a global document
//! delegating one database's policy to a separate file, exercised the way
//! the warehouse's session layer would.

use std::fs;
use std::path::PathBuf;

use lodestone_engine::{
    Action, Decision, DenyReason, EngineConfig, EngineError, PolicyEngine, Resource,
};
use tempfile::TempDir;

const GLOBAL_POLICY: &str = "\
[groups]
admin = all_server
user_group1 = select_tbl1
user_group2 = select_tbl2
[roles]
all_server = server=server1
select_tbl1 = server=server1->db=db1->table=tbl1->action=select
[users]
warehouse = admin
user_1 = user_group1
user_2 = user_group2
[databases]
db2 = db2-policy.ini
";

const DB2_POLICY: &str = "\
[groups]
user_group2 = select_tbl2
[roles]
select_tbl2 = server=server1->db=db2->table=tbl2->action=select
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(global: &str, db2: Option<&str>) -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("policy.ini"), global).expect("write global policy");
        if let Some(content) = db2 {
            fs::write(dir.path().join("db2-policy.ini"), content).expect("write db2 policy");
        }
        Self { dir }
    }

    fn global_path(&self) -> PathBuf {
        self.dir.path().join("policy.ini")
    }

    fn engine(&self) -> PolicyEngine {
        PolicyEngine::open(self.global_path(), EngineConfig::default()).expect("open engine")
    }
}

fn tbl1() -> Resource {
    Resource::table("server1", "db1", "tbl1")
}

fn tbl2() -> Resource {
    Resource::table("server1", "db2", "tbl2")
}

#[test]
fn per_database_delegation_scenario() {
    let fixture = Fixture::new(GLOBAL_POLICY, Some(DB2_POLICY));
    let engine = fixture.engine();

    // user_1 reads tbl1 through the global document, nothing else.
    assert!(engine.check("user_1", Action::Select, &tbl1()).unwrap().is_allowed());
    assert!(!engine.check("user_1", Action::Select, &tbl2()).unwrap().is_allowed());

    // user_2 reads tbl2 through the delegated db2 document, nothing else.
    assert!(engine.check("user_2", Action::Select, &tbl2()).unwrap().is_allowed());
    assert!(!engine.check("user_2", Action::Select, &tbl1()).unwrap().is_allowed());

    // The admin's bare server-level grant covers every action everywhere.
    for action in [Action::Select, Action::Create, Action::Drop] {
        assert!(engine.check("warehouse", action, &tbl1()).unwrap().is_allowed());
        assert!(engine.check("warehouse", action, &tbl2()).unwrap().is_allowed());
    }
}

#[test]
fn principal_without_mapping_is_denied_everywhere() {
    let fixture = Fixture::new(GLOBAL_POLICY, Some(DB2_POLICY));
    let engine = fixture.engine();

    for resource in [tbl1(), tbl2(), Resource::server("server1")] {
        let decision = engine.check("stranger", Action::Select, &resource).unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NoGroups));
    }
}

#[test]
fn malformed_db2_document_leaves_db1_intact() {
    let fixture = Fixture::new(GLOBAL_POLICY, Some("[roles]\nselect_tbl2 = garbage\n"));
    let engine = fixture.engine();

    assert!(engine.check("user_1", Action::Select, &tbl1()).unwrap().is_allowed());
    assert!(!engine.check("user_2", Action::Select, &tbl2()).unwrap().is_allowed());
}

#[test]
fn unknown_database_denies_with_informational_reason() {
    let fixture = Fixture::new(GLOBAL_POLICY, Some(DB2_POLICY));
    let engine = fixture.engine();

    let decision = engine
        .check("user_1", Action::Select, &Resource::table("server1", "db9", "t"))
        .unwrap();
    assert_eq!(
        decision,
        Decision::Deny(DenyReason::UnknownDatabase {
            database: "db9".to_string(),
        })
    );
}

#[test]
fn reload_picks_up_new_delegated_grants() {
    // Start without the db2 document: delegation is degraded.
    let fixture = Fixture::new(GLOBAL_POLICY, None);
    let engine = fixture.engine();
    assert!(!engine.check("user_2", Action::Select, &tbl2()).unwrap().is_allowed());

    // Drop the delegated file in place and reload.
    fs::write(fixture.dir.path().join("db2-policy.ini"), DB2_POLICY).unwrap();
    engine.trigger_reload().unwrap();

    assert!(engine.check("user_2", Action::Select, &tbl2()).unwrap().is_allowed());
    assert!(engine.check("user_1", Action::Select, &tbl1()).unwrap().is_allowed());
}

#[test]
fn failed_reload_is_indistinguishable_from_no_reload() {
    let fixture = Fixture::new(GLOBAL_POLICY, Some(DB2_POLICY));
    let engine = fixture.engine();

    let before = [
        engine.check("user_1", Action::Select, &tbl1()).unwrap(),
        engine.check("user_1", Action::Select, &tbl2()).unwrap(),
        engine.check("user_2", Action::Select, &tbl2()).unwrap(),
        engine.check("warehouse", Action::Drop, &tbl1()).unwrap(),
    ];

    // Corrupt the global document: the reload must fail closed on it.
    fs::write(fixture.global_path(), "[groups]\nbroken\n").unwrap();
    assert!(matches!(
        engine.trigger_reload(),
        Err(EngineError::ReloadFailed(_))
    ));

    let after = [
        engine.check("user_1", Action::Select, &tbl1()).unwrap(),
        engine.check("user_1", Action::Select, &tbl2()).unwrap(),
        engine.check("user_2", Action::Select, &tbl2()).unwrap(),
        engine.check("warehouse", Action::Drop, &tbl1()).unwrap(),
    ];
    assert_eq!(before, after);
}

#[test]
fn checks_race_reloads_without_observing_partial_policy() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Two policy generations granting disjoint privileges to the same
    // principal: generation A allows tbl1 only, generation B tbl2 only.
    let gen_a = "\
[groups]
g = only_tbl1
[roles]
only_tbl1 = server=server1->db=db1->table=tbl1->action=select
[users]
mover = g
[databases]
db2 = db2-policy.ini
";
    let gen_b = "\
[groups]
g = only_tbl2
[roles]
only_tbl2 = server=server1->db=db2->table=tbl2->action=select
[users]
mover = g
[databases]
db2 = db2-policy.ini
";

    let fixture = Fixture::new(gen_a, Some(DB2_POLICY));
    let engine = Arc::new(fixture.engine());
    let stop = Arc::new(AtomicBool::new(false));

    let checkers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    // Every check must complete against some fully
                    // published generation; an error here means a torn
                    // or poisoned snapshot.
                    engine.check("mover", Action::Select, &tbl1()).unwrap();
                    engine.check("mover", Action::Select, &tbl2()).unwrap();
                }
            })
        })
        .collect();

    for generation in [gen_b, gen_a, gen_b, gen_a] {
        fs::write(fixture.global_path(), generation).unwrap();
        // Coalesced outcomes are fine; the point is the races.
        let _ = engine.trigger_reload();
    }

    stop.store(true, Ordering::Relaxed);
    for checker in checkers {
        checker.join().unwrap();
    }

    // After the last published generation (A), results are exactly A's.
    assert!(engine.check("mover", Action::Select, &tbl1()).unwrap().is_allowed());
    assert!(!engine.check("mover", Action::Select, &tbl2()).unwrap().is_allowed());
}

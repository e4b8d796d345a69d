use rowkeeper_core::builtin::builtin_registry;
use rowkeeper_core::schema::sync_app_schema;
use rowkeeper_core::{AppContext, SearchMode, StoreConfig};
use std::thread;

const THREADS: usize = 16;
const CHAINS: usize = 16;

#[test]
fn parallel_user_create_delete_chains_leave_no_residue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mayhem.db");
    let mut config = StoreConfig::sqlite(path.to_string_lossy(), "rprj");
    config.pool.max_open = 8;
    config.pool.max_idle = 2;

    let app = AppContext::open(config, builtin_registry().unwrap()).unwrap();
    sync_app_schema(&app).unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let app = app.clone();
            thread::spawn(move || {
                let repo = app.repository(app.context_for("", &[]));
                for chain in 0..CHAINS {
                    let mut user = repo.instance_for("DBUser").unwrap();
                    user.set("login", format!("mayhem_{worker}_{chain}"));
                    user.set("pwd", "secret");
                    let user = repo.insert(user).unwrap();
                    repo.delete(user).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let repo = app.repository(app.context_for("", &[]));
    let users = repo.instance_for("DBUser").unwrap();
    assert!(repo.search(&users, SearchMode::exact(), "").unwrap().is_empty());

    let mut groups = repo.instance_for("DBGroup").unwrap();
    groups.set("name", "mayhem_");
    assert!(repo
        .search(&groups, SearchMode::like(false), "")
        .unwrap()
        .is_empty());

    let memberships = repo.instance_for("UserGroup").unwrap();
    assert!(repo
        .search(&memberships, SearchMode::exact(), "")
        .unwrap()
        .is_empty());
}

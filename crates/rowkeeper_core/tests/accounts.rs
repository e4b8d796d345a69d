use rowkeeper_core::builtin::{builtin_registry, GROUP_IDS_METADATA, USER_IDS_METADATA};
use rowkeeper_core::schema::sync_app_schema;
use rowkeeper_core::{AppContext, Entity, Repository, SearchMode, StoreConfig, Value};
use serde_json::json;
use std::sync::Arc;

fn memory_app() -> Arc<AppContext> {
    let app = AppContext::open(
        StoreConfig::sqlite_in_memory("rprj"),
        builtin_registry().unwrap(),
    )
    .unwrap();
    sync_app_schema(&app).unwrap();
    app
}

fn admin(app: &Arc<AppContext>) -> Repository {
    app.repository(app.context_for("", &[]))
}

fn new_user(repo: &Repository, login: &str) -> Entity {
    let mut user = repo.instance_for("DBUser").unwrap();
    user.set("login", login);
    user.set("pwd", "secret");
    user
}

fn rows(repo: &Repository, type_name: &str, column: &str, value: &str) -> Vec<Entity> {
    let mut filter = repo.instance_for(type_name).unwrap();
    filter.set(column, value);
    repo.search(&filter, SearchMode::exact(), "").unwrap()
}

fn count_all(repo: &Repository, type_name: &str) -> usize {
    let filter = repo.instance_for(type_name).unwrap();
    repo.search(&filter, SearchMode::exact(), "").unwrap().len()
}

fn text(entity: &Entity, column: &str) -> String {
    entity.text(column).unwrap().unwrap().to_string()
}

#[test]
fn new_user_gets_personal_group_and_membership() {
    let app = memory_app();
    let repo = admin(&app);

    let bob = repo.insert(new_user(&repo, "bob")).unwrap();
    let user_id = text(&bob, "id");
    let group_id = text(&bob, "group_id");

    let groups = rows(&repo, "DBGroup", "name", "bob's group");
    assert_eq!(groups.len(), 1);
    assert_eq!(text(&groups[0], "id"), group_id);
    assert_eq!(
        groups[0].get("description"),
        Some(&Value::from("Personal group for bob"))
    );

    let memberships = rows(&repo, "UserGroup", "user_id", &user_id);
    assert_eq!(memberships.len(), 1);
    assert_eq!(text(&memberships[0], "group_id"), group_id);
}

#[test]
fn failed_membership_rolls_back_user_and_group() {
    let app = memory_app();
    let repo = admin(&app);

    let mut bob = new_user(&repo, "bob");
    bob.set_metadata(GROUP_IDS_METADATA, json!(["0000000000000000"]));
    assert!(repo.insert(bob).is_err());

    assert!(rows(&repo, "DBUser", "login", "bob").is_empty());
    assert!(rows(&repo, "DBGroup", "name", "bob's group").is_empty());
    assert_eq!(count_all(&repo, "UserGroup"), 0);
}

#[test]
fn duplicate_login_is_rejected_and_first_user_survives() {
    let app = memory_app();
    let repo = admin(&app);

    let first = repo.insert(new_user(&repo, "bob")).unwrap();
    let err = repo.insert(new_user(&repo, "bob")).unwrap_err();
    assert!(err.is_already_exists());
    assert!(err.to_string().contains("already exists"));

    let users = rows(&repo, "DBUser", "login", "bob");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].get("id"), first.get("id"));
    assert_eq!(count_all(&repo, "DBGroup"), 1);
    assert_eq!(count_all(&repo, "UserGroup"), 1);
}

#[test]
fn duplicate_group_name_is_rejected() {
    let app = memory_app();
    let repo = admin(&app);

    let mut staff = repo.instance_for("DBGroup").unwrap();
    staff.set("name", "staff");
    repo.insert(staff.clone()).unwrap();
    let err = repo.insert(staff).unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(err.to_string(), "group with name 'staff' already exists");
}

#[test]
fn extra_groups_from_metadata_become_memberships() {
    let app = memory_app();
    let repo = admin(&app);

    let mut staff = repo.instance_for("DBGroup").unwrap();
    staff.set("name", "staff");
    let staff = repo.insert(staff).unwrap();
    let staff_id = text(&staff, "id");

    let mut carol = new_user(&repo, "carol");
    carol.set_metadata(GROUP_IDS_METADATA, json!([staff_id.clone()]));
    let carol = repo.insert(carol).unwrap();
    let carol_id = text(&carol, "id");
    assert_eq!(rows(&repo, "UserGroup", "user_id", &carol_id).len(), 2);

    let mut patch = repo.instance_for("DBUser").unwrap();
    patch.set("id", carol_id.as_str());
    patch.set("fullname", "Carol C.");
    patch.set_metadata(GROUP_IDS_METADATA, json!([]));
    repo.update(patch).unwrap();

    let memberships = rows(&repo, "UserGroup", "user_id", &carol_id);
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].get("group_id"), carol.get("group_id"));
    assert_eq!(
        rows(&repo, "DBUser", "id", &carol_id)[0].get("fullname"),
        Some(&Value::from("Carol C."))
    );
}

#[test]
fn group_update_replaces_its_members() {
    let app = memory_app();
    let repo = admin(&app);
    let dave = repo.insert(new_user(&repo, "dave")).unwrap();
    let erin = repo.insert(new_user(&repo, "erin")).unwrap();

    let mut staff = repo.instance_for("DBGroup").unwrap();
    staff.set("name", "staff");
    let staff = repo.insert(staff).unwrap();
    let staff_id = text(&staff, "id");

    let mut patch = staff.clone();
    patch.set_metadata(USER_IDS_METADATA, json!([text(&dave, "id"), text(&erin, "id")]));
    repo.update(patch).unwrap();
    assert_eq!(rows(&repo, "UserGroup", "group_id", &staff_id).len(), 2);

    let mut patch = staff.clone();
    patch.set_metadata(USER_IDS_METADATA, json!([text(&erin, "id")]));
    repo.update(patch).unwrap();
    let members = rows(&repo, "UserGroup", "group_id", &staff_id);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].get("user_id"), erin.get("id"));
}

#[test]
fn deleting_a_user_removes_memberships_and_personal_group() {
    let app = memory_app();
    let repo = admin(&app);

    let mut staff = repo.instance_for("DBGroup").unwrap();
    staff.set("name", "staff");
    let staff = repo.insert(staff).unwrap();

    let mut frank = new_user(&repo, "frank");
    frank.set_metadata(GROUP_IDS_METADATA, json!([text(&staff, "id")]));
    let frank = repo.insert(frank).unwrap();
    let frank_id = text(&frank, "id");

    let mut by_key = repo.instance_for("DBUser").unwrap();
    by_key.set("id", frank_id.as_str());
    repo.delete(by_key).unwrap();

    assert!(rows(&repo, "DBUser", "id", &frank_id).is_empty());
    assert!(rows(&repo, "UserGroup", "user_id", &frank_id).is_empty());
    assert!(rows(&repo, "DBGroup", "name", "frank's group").is_empty());
    assert_eq!(rows(&repo, "DBGroup", "name", "staff").len(), 1);
}

#[test]
fn deleting_a_group_removes_its_memberships() {
    let app = memory_app();
    let repo = admin(&app);

    let mut staff = repo.instance_for("DBGroup").unwrap();
    staff.set("name", "staff");
    let staff = repo.insert(staff).unwrap();
    let staff_id = text(&staff, "id");

    let mut gina = new_user(&repo, "gina");
    gina.set_metadata(GROUP_IDS_METADATA, json!([staff_id.clone()]));
    let gina = repo.insert(gina).unwrap();

    repo.delete(staff).unwrap();
    assert!(rows(&repo, "DBGroup", "id", &staff_id).is_empty());
    let left = rows(&repo, "UserGroup", "user_id", &text(&gina, "id"));
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].get("group_id"), gina.get("group_id"));
}

#[test]
fn acting_user_is_loaded_from_the_users_table() {
    let app = memory_app();
    let repo = admin(&app);
    assert!(repo.current_user().unwrap().is_none());

    let hana = repo.insert(new_user(&repo, "hana")).unwrap();
    let as_hana = app.repository(app.context_for(&text(&hana, "id"), &[]));
    let current = as_hana.current_user().unwrap().unwrap();
    assert_eq!(current.get("login"), Some(&Value::from("hana")));
}

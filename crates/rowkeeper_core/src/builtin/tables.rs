//! Descriptors of the built-in tables.

use crate::model::column::{Column, ForeignKey};
use crate::model::descriptor::{
    object_columns as obj, DescriptorError, EntityDescriptor, GROUPS_TABLE, OBJECTS_TABLE,
    USERS_TABLE,
};

pub const VERSION_TABLE: &str = "dbversion";
pub const OAUTH_TOKENS_TABLE: &str = "oauth_tokens";
pub const USERS_GROUPS_TABLE: &str = "users_groups";
pub const FOLDERS_TABLE: &str = "folders";
pub const LINKS_TABLE: &str = "links";
pub const NOTES_TABLE: &str = "notes";
pub const PAGES_TABLE: &str = "pages";

pub mod user_columns {
    pub const ID: &str = "id";
    pub const LOGIN: &str = "login";
    pub const PWD: &str = "pwd";
    pub const PWD_SALT: &str = "pwd_salt";
    pub const FULLNAME: &str = "fullname";
    pub const GROUP_ID: &str = "group_id";
}

pub mod group_columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
}

pub mod membership_columns {
    pub const USER_ID: &str = "user_id";
    pub const GROUP_ID: &str = "group_id";
}

pub fn version() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::plain(
        "DBVersion",
        VERSION_TABLE,
        vec![
            Column::new("model_name", "varchar(255)", &["NOT NULL"]),
            Column::new("version", "int(11)", &["NOT NULL"]),
        ],
        &["model_name"],
        vec![],
    )
}

pub fn oauth_token() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::plain(
        "OAuthToken",
        OAUTH_TOKENS_TABLE,
        vec![
            Column::new("token_id", "varchar(64)", &["NOT NULL"]),
            Column::new("user_id", "varchar(16)", &["NOT NULL"]),
            Column::new("access_token", "text", &["NOT NULL"]),
            Column::new("refresh_token", "text", &[]),
            Column::new("expires_at", "datetime", &["NOT NULL"]),
            Column::new("created_at", "datetime", &[]),
        ],
        &["token_id"],
        vec![ForeignKey::new("user_id", USERS_TABLE, user_columns::ID)],
    )
}

pub fn user() -> Result<EntityDescriptor, DescriptorError> {
    use user_columns::*;
    EntityDescriptor::plain(
        "DBUser",
        USERS_TABLE,
        vec![
            Column::new(ID, "varchar(16)", &["NOT NULL"]),
            Column::new(LOGIN, "varchar(255)", &["NOT NULL", "UNIQUE"]),
            Column::new(PWD, "varchar(255)", &["NOT NULL"]),
            Column::new(PWD_SALT, "varchar(4)", &[]),
            Column::new(FULLNAME, "text", &[]),
            Column::new(GROUP_ID, "varchar(16)", &["NOT NULL"]),
        ],
        &[ID],
        vec![ForeignKey::new(GROUP_ID, GROUPS_TABLE, group_columns::ID)],
    )
}

pub fn membership() -> Result<EntityDescriptor, DescriptorError> {
    use membership_columns::*;
    EntityDescriptor::association(
        "UserGroup",
        USERS_GROUPS_TABLE,
        vec![
            Column::new(USER_ID, "varchar(16)", &["NOT NULL"]),
            Column::new(GROUP_ID, "varchar(16)", &["NOT NULL"]),
        ],
        &[USER_ID, GROUP_ID],
        vec![
            ForeignKey::new(USER_ID, USERS_TABLE, user_columns::ID),
            ForeignKey::new(GROUP_ID, GROUPS_TABLE, group_columns::ID),
        ],
    )
}

pub fn group() -> Result<EntityDescriptor, DescriptorError> {
    use group_columns::*;
    EntityDescriptor::plain(
        "DBGroup",
        GROUPS_TABLE,
        vec![
            Column::new(ID, "varchar(16)", &["NOT NULL"]),
            Column::new(NAME, "varchar(255)", &["NOT NULL", "UNIQUE"]),
            Column::new(DESCRIPTION, "text", &[]),
        ],
        &[ID],
        vec![],
    )
}

pub fn object() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::object("DBObject", OBJECTS_TABLE, vec![], vec![])
}

fn fk_obj_id() -> Column {
    Column::new(obj::FK_OBJ_ID, "varchar(16)", &["DEFAULT NULL"])
}

/// `fk_obj_id` references, one per possible parent table.
fn fk_obj_targets(tables: &[&str]) -> Vec<ForeignKey> {
    tables
        .iter()
        .map(|table| ForeignKey::new(obj::FK_OBJ_ID, table, obj::ID))
        .collect()
}

pub fn folder() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::object(
        "DBFolder",
        FOLDERS_TABLE,
        vec![
            fk_obj_id(),
            Column::new("childs_sort_order", "text", &["DEFAULT NULL"]),
        ],
        fk_obj_targets(&[OBJECTS_TABLE, FOLDERS_TABLE]),
    )
}

pub fn link() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::object(
        "DBLink",
        LINKS_TABLE,
        vec![
            Column::new("href", "varchar(255)", &["NOT NULL"]),
            Column::new("target", "varchar(255)", &["DEFAULT '_blank'"]),
            fk_obj_id(),
        ],
        fk_obj_targets(&[OBJECTS_TABLE, FOLDERS_TABLE]),
    )
}

pub fn note() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::object(
        "DBNote",
        NOTES_TABLE,
        vec![fk_obj_id()],
        fk_obj_targets(&[OBJECTS_TABLE, FOLDERS_TABLE, PAGES_TABLE]),
    )
}

pub fn page() -> Result<EntityDescriptor, DescriptorError> {
    EntityDescriptor::object(
        "DBPage",
        PAGES_TABLE,
        vec![Column::new("html", "text", &["DEFAULT NULL"]), fk_obj_id()],
        fk_obj_targets(&[OBJECTS_TABLE, FOLDERS_TABLE]),
    )
}

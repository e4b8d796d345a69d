//! Entity persistence: context, SQL building, lifecycle hooks and the
//! transactional repository.

mod context;
pub mod entity_repo;
pub mod error;
pub mod hooks;
pub mod ownership;
pub mod statement;

pub use context::RepoContext;
pub use entity_repo::Repository;
pub use error::{RepoError, RepoResult};
pub use hooks::{DeletePhase, EntityHooks, NoHooks, TxScope};
pub use statement::SearchMode;

//! PostgreSQL implementations of the Entity Store traits.

pub mod node;
pub mod share;
pub mod user;

pub use node::NodeRepository;
pub use share::ShareRepository;
pub use user::UserRepository;

use nimbus_core::error::{AppError, ErrorKind};

/// Name of the partial unique index backing sibling-name uniqueness.
pub(crate) const SIBLING_NAME_INDEX: &str = "nodes_live_sibling_name_key";

/// Name of the partial unique index allowing one link share per node.
pub(crate) const LINK_SHARE_INDEX: &str = "shares_link_per_node_key";

/// Map a sqlx error, turning unique violations on `index` into `on_unique`.
pub(crate) fn map_write_error(
    err: sqlx::Error,
    context: &'static str,
    index: &str,
    on_unique: impl FnOnce() -> AppError,
) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(index) {
            return on_unique();
        }
    }
    AppError::with_source(ErrorKind::Database, context, err)
}

//! Repository layer for SQLite persistence.
//!
//! Repositories own a database path and open a connection per call.
//! Foreign keys are enabled on every connection so priority topics
//! cascade-delete with their owning token.

pub mod notification;
pub mod plan;

pub use notification::NotificationRepository;
pub use plan::PlanRepository;

use std::path::Path;

use rusqlite::Connection;

/// Repository result type.
pub type Result<T> = std::result::Result<T, rusqlite::Error>;

pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

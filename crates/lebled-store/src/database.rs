//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. It also owns the
//! [`RealtimeHub`] on which inserted messages are pushed.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;
use crate::realtime::RealtimeHub;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
    hub: RealtimeHub,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/lebled/lebled.db`
    /// - macOS:   `~/Library/Application Support/dz.lebled.lebled/lebled.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\lebled\lebled\data\lebled.db`
    pub fn new() -> Result<Self> {
        let db_path = Self::default_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Location of the default application database.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("dz", "lebled", "lebled").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("lebled.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL is meaningless for in-memory connections, so only set it here.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::init(conn)
    }

    /// Open a private in-memory database. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            hub: RealtimeHub::new(),
        })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// The hub on which every inserted message is published.
    pub fn realtime(&self) -> &RealtimeHub {
        &self.hub
    }
}

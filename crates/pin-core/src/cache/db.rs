use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::{debug, error, info};

use crate::error::CacheError;
use crate::models::{AttributeOption, OptionValue};

/// Database name; the file is `<data_dir>/optionsDB.sqlite`.
pub const DB_NAME: &str = "optionsDB";

/// Schema version stored in `PRAGMA user_version`.
pub const DB_VERSION: i32 = 1;

const ATTRIBUTES_STORE: &str = "attributes";
const OPTIONS_STORE: &str = "options";

/// Creates each store only if absent; there are no migrations.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attributes (
    value TEXT PRIMARY KEY NOT NULL,
    label TEXT NOT NULL,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute TEXT NOT NULL,
    value TEXT NOT NULL,
    visual TEXT NOT NULL,
    type TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    Loading,
    Ready,
    Error,
}

enum Location {
    File(PathBuf),
    Memory,
}

pub struct OptionsDb {
    location: Location,
    conn: Option<Connection>,
    status: DbStatus,
}

impl OptionsDb {
    /// Database stored under `data_dir`. Nothing is opened until `initialize`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(format!("{}.sqlite", DB_NAME));
        Self {
            location: Location::File(path),
            conn: None,
            status: DbStatus::Loading,
        }
    }

    /// Database that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: None,
            status: DbStatus::Loading,
        }
    }

    pub fn status(&self) -> DbStatus {
        self.status
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Open the database, creating the file and both stores on first run.
    pub fn initialize(&mut self) -> Result<(), CacheError> {
        match self.open() {
            Ok(conn) => {
                self.conn = Some(conn);
                self.status = DbStatus::Ready;
                info!(db = DB_NAME, version = DB_VERSION, "Option database ready");
                Ok(())
            }
            Err(e) => {
                self.status = DbStatus::Error;
                error!(db = DB_NAME, error = %e, "Failed to open option database");
                Err(e)
            }
        }
    }

    fn open(&self) -> Result<Connection, CacheError> {
        let conn = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path).map_err(CacheError::Open)?
            }
            Location::Memory => Connection::open_in_memory().map_err(CacheError::Open)?,
        };

        let found: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(CacheError::Open)?;
        if found > DB_VERSION {
            return Err(CacheError::VersionMismatch {
                found,
                expected: DB_VERSION,
            });
        }

        conn.execute_batch(SCHEMA).map_err(CacheError::Open)?;
        if found < DB_VERSION {
            debug!(from = found, to = DB_VERSION, "Upgrading option database");
            conn.pragma_update(None, "user_version", DB_VERSION)
                .map_err(CacheError::Open)?;
        }

        Ok(conn)
    }

    fn conn(&self) -> Result<&Connection, CacheError> {
        self.conn.as_ref().ok_or(CacheError::NotInitialized)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, CacheError> {
        self.conn.as_mut().ok_or(CacheError::NotInitialized)
    }

    // ===== Attributes =====

    /// Replace every stored attribute with `attributes`.
    pub fn save_attributes(&mut self, attributes: &[AttributeOption]) -> Result<(), CacheError> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM attributes", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO attributes (value, label, type) VALUES (?1, ?2, ?3)")?;
            for attribute in attributes {
                stmt.execute(params![attribute.value, attribute.label, attribute.kind])?;
            }
        }
        tx.commit()?;

        debug!(store = ATTRIBUTES_STORE, count = attributes.len(), "Saved store");
        Ok(())
    }

    /// All stored attributes, in key order.
    ///
    /// Keys compare by UTF-8 bytes, which matches UTF-16 code unit order
    /// except when keys mix U+E000..=U+FFFF with characters above U+FFFF.
    pub fn get_attributes(&self) -> Result<Vec<AttributeOption>, CacheError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value, label, type FROM attributes ORDER BY value")?;
        let rows = stmt.query_map([], |row| {
            Ok(AttributeOption {
                value: row.get(0)?,
                label: row.get(1)?,
                kind: row.get(2)?,
            })
        })?;

        let attributes = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(store = ATTRIBUTES_STORE, count = attributes.len(), "Loaded store");
        Ok(attributes)
    }

    // ===== Options =====

    /// Replace every stored option with `options`.
    ///
    /// Options without an `id` get one from the store's key generator, which
    /// is not reset by the clear.
    pub fn save_options(&mut self, options: &[OptionValue]) -> Result<(), CacheError> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM options", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO options (id, attribute, value, visual, type) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for option in options {
                stmt.execute(params![
                    option.id,
                    option.attribute,
                    option.value,
                    option.visual,
                    option.kind
                ])?;
            }
        }
        tx.commit()?;

        debug!(store = OPTIONS_STORE, count = options.len(), "Saved store");
        Ok(())
    }

    /// All stored options, in `id` order.
    pub fn get_options(&self) -> Result<Vec<OptionValue>, CacheError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, attribute, value, visual, type FROM options ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(OptionValue {
                id: Some(row.get(0)?),
                attribute: row.get(1)?,
                value: row.get(2)?,
                visual: row.get(3)?,
                kind: row.get(4)?,
            })
        })?;

        let options = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(store = OPTIONS_STORE, count = options.len(), "Loaded store");
        Ok(options)
    }
}

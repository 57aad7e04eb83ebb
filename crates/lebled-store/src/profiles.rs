//! CRUD operations for [`Profile`] records.

use chrono::Utc;
use rusqlite::params;

use lebled_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::{parse_timestamp, parse_uuid};
use crate::models::Profile;

impl Database {
    /// Insert a profile, or update the name and email of an existing one.
    pub fn upsert_profile(&self, id: UserId, full_name: Option<&str>, email: Option<&str>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (id, full_name, email, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name, email = excluded.email",
            params![id.to_string(), full_name, email, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Fetch a single profile.
    pub fn get_profile(&self, id: UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT id, full_name, email, created_at FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let id_str: String = row.get(0)?;
                    let ts_str: String = row.get(3)?;
                    Ok(Profile {
                        id: UserId(parse_uuid(0, &id_str)?),
                        full_name: row.get(1)?,
                        email: row.get(2)?,
                        created_at: parse_timestamp(3, &ts_str)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

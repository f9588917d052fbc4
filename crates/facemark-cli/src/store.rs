//! SQLite store of enrolled faces.
//!
//! Each identity holds at most one face. A face is stored as a descriptor
//! blob (little-endian f32), as the raw capture when extraction failed at
//! enrollment time, or as neither for legacy rows.

use anyhow::{bail, Context, Result};
use facemark_core::{Descriptor, EnrolledDescriptor, FaceMaterial, FaceRecord, RawImage};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

/// One row of the store as shown by `facemark list`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFace {
    pub id: String,
    pub identity: String,
    /// `descriptor`, `image` or `missing`.
    pub material: &'static str,
    pub created_at: String,
}

pub struct FaceStore {
    conn: Connection,
}

impl FaceStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening face store {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS faces (
                id          TEXT PRIMARY KEY,
                identity    TEXT NOT NULL UNIQUE,
                descriptor  BLOB,
                image       BLOB,
                created_at  TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn contains(&self, identity: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM faces WHERE identity = ?1",
                params![identity],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store a face for `identity`. Returns the new row id.
    pub fn insert(&self, identity: &str, material: &FaceMaterial) -> Result<String> {
        if self.contains(identity)? {
            bail!("identity {identity} is already enrolled");
        }
        let (descriptor, image) = match material {
            FaceMaterial::Descriptor(d) => (Some(d.to_bytes()), None),
            FaceMaterial::Image(raw) => (None, Some(raw.as_bytes().to_vec())),
            FaceMaterial::Missing => (None, None),
        };
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO faces (id, identity, descriptor, image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, identity, descriptor, image, created_at],
        )?;
        tracing::debug!(%id, "face stored");
        Ok(id)
    }

    /// Every stored face in enrollment order.
    pub fn list_records(&self) -> Result<Vec<FaceRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identity, descriptor, image FROM faces ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<Vec<u8>>>(1)?,
                row.get::<_, Option<Vec<u8>>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (identity, descriptor, image) = row?;
            let material = material_from_columns(&identity, descriptor, image);
            records.push(FaceRecord { identity, material });
        }
        Ok(records)
    }

    /// Identities with their stored descriptors, if any.
    pub fn list_enrolled(&self) -> Result<Vec<EnrolledDescriptor>> {
        Ok(self
            .list_records()?
            .into_iter()
            .map(|record| EnrolledDescriptor {
                descriptor: record.descriptor().cloned(),
                identity: record.identity,
            })
            .collect())
    }

    pub fn list(&self) -> Result<Vec<StoredFace>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identity, descriptor IS NOT NULL, image IS NOT NULL, created_at
             FROM faces ORDER BY rowid",
        )?;
        let faces = stmt
            .query_map([], stored_face)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(faces)
    }

    /// Remove the face enrolled under `identity`. Returns whether a row
    /// was deleted.
    pub fn remove(&self, identity: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM faces WHERE identity = ?1", params![identity])?;
        Ok(deleted > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn stored_face(row: &Row<'_>) -> rusqlite::Result<StoredFace> {
    let has_descriptor: bool = row.get(2)?;
    let has_image: bool = row.get(3)?;
    Ok(StoredFace {
        id: row.get(0)?,
        identity: row.get(1)?,
        material: match (has_descriptor, has_image) {
            (true, _) => "descriptor",
            (false, true) => "image",
            (false, false) => "missing",
        },
        created_at: row.get(4)?,
    })
}

fn material_from_columns(
    identity: &str,
    descriptor: Option<Vec<u8>>,
    image: Option<Vec<u8>>,
) -> FaceMaterial {
    if let Some(blob) = descriptor {
        match Descriptor::from_bytes(&blob) {
            Ok(d) => return FaceMaterial::Descriptor(d),
            Err(e) => tracing::warn!(identity, error = %e, "corrupt descriptor blob"),
        }
    }
    match image {
        Some(bytes) => FaceMaterial::Image(RawImage::new(bytes)),
        None => FaceMaterial::Missing,
    }
}

//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist whole document trees as wire JSON.
//! - Maintain a per-document scene index for list views.
//! - Run legacy migration and load repairs on every load.
//!
//! # Invariants
//! - Only scene-partitioned (or empty) trees are written.
//! - The scene index is rewritten in the same SQL transaction as the body.
//! - Read paths reject undecodable payloads instead of masking them.

use crate::db::DbError;
use crate::model::node::SchemaViolation;
use crate::model::scene::{SceneId, SceneStatus, ValidationError};
use crate::tree::migration::{migrate_with_report, MigrationReport};
use crate::tree::wire::WireError;
use crate::tree::Document;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable document identifier.
pub type DocumentId = Uuid;

pub type DocumentRepoResult<T> = Result<T, DocumentRepoError>;

/// Document persistence failure.
#[derive(Debug)]
pub enum DocumentRepoError {
    Db(DbError),
    Wire(WireError),
    /// Tree breaks the scene partition and cannot be saved.
    Schema(SchemaViolation),
    NotFound(DocumentId),
    InvalidData(String),
}

impl Display for DocumentRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Wire(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "refusing to save unpartitioned document: {err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
        }
    }
}

impl Error for DocumentRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Wire(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for DocumentRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DocumentRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<WireError> for DocumentRepoError {
    fn from(value: WireError) -> Self {
        Self::Wire(value)
    }
}

/// Document read back from storage, already migrated.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub id: DocumentId,
    pub title: String,
    pub document: Document,
    /// Repairs applied while loading; persisted on the next save.
    pub migration: MigrationReport,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

/// Lightweight row for document lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub scene_count: u32,
    pub updated_at: i64,
}

/// One row of the persisted scene index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneIndexEntry {
    pub scene_id: SceneId,
    /// 1-based scene number at save time.
    pub number: u32,
    pub title: String,
    pub status: SceneStatus,
    pub location_id: Option<String>,
}

/// Repository interface for document persistence.
pub trait DocumentRepository {
    fn save_document(&self, id: DocumentId, title: &str, document: &Document)
        -> DocumentRepoResult<()>;
    fn load_document(&self, id: DocumentId) -> DocumentRepoResult<Option<LoadedDocument>>;
    fn list_documents(&self) -> DocumentRepoResult<Vec<DocumentSummary>>;
    fn delete_document(&self, id: DocumentId) -> DocumentRepoResult<()>;
    fn scene_index(&self, id: DocumentId) -> DocumentRepoResult<Vec<SceneIndexEntry>>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn save_document(
        &self,
        id: DocumentId,
        title: &str,
        document: &Document,
    ) -> DocumentRepoResult<()> {
        if let Some(violation) = document.partition_violation() {
            return Err(DocumentRepoError::Schema(violation));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (
                doc_uuid,
                title,
                body_json,
                scene_count,
                created_at,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                (strftime('%s', 'now') * 1000),
                (strftime('%s', 'now') * 1000)
            )
            ON CONFLICT(doc_uuid) DO UPDATE SET
                title = excluded.title,
                body_json = excluded.body_json,
                scene_count = excluded.scene_count,
                updated_at = excluded.updated_at;",
            params![
                id.to_string(),
                title,
                document.to_json_string(),
                document.scene_count() as i64,
            ],
        )?;

        tx.execute(
            "DELETE FROM document_scenes WHERE doc_uuid = ?1;",
            params![id.to_string()],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO document_scenes (
                    doc_uuid,
                    scene_uuid,
                    ordinal,
                    title,
                    status,
                    location_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for placement in document.scenes() {
                let attrs = &placement.scene.attrs;
                insert.execute(params![
                    id.to_string(),
                    attrs.id.to_string(),
                    placement.ordinal as i64,
                    attrs.title.as_str(),
                    attrs.status.as_str(),
                    attrs.location_id.as_deref(),
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "event=document_save module=repo status=ok doc_id={} scene_count={}",
            id,
            document.scene_count()
        );
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> DocumentRepoResult<Option<LoadedDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT title, body_json, created_at, updated_at
                 FROM documents
                 WHERE doc_uuid = ?1;",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((title, body_json, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let decoded = Document::from_json_str(&body_json)?;
        let (document, migration) = migrate_with_report(&decoded);
        info!(
            "event=document_load module=repo status=ok doc_id={} scene_count={} repaired={}",
            id,
            document.scene_count(),
            !migration.is_noop()
        );
        Ok(Some(LoadedDocument {
            id,
            title,
            document,
            migration,
            created_at,
            updated_at,
        }))
    }

    fn list_documents(&self) -> DocumentRepoResult<Vec<DocumentSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_uuid, title, scene_count, updated_at
             FROM documents
             ORDER BY updated_at DESC, doc_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_summary_row(row)?);
        }
        Ok(documents)
    }

    fn delete_document(&self, id: DocumentId) -> DocumentRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE doc_uuid = ?1;",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(DocumentRepoError::NotFound(id));
        }
        info!(
            "event=document_delete module=repo status=ok doc_id={}",
            id
        );
        Ok(())
    }

    fn scene_index(&self, id: DocumentId) -> DocumentRepoResult<Vec<SceneIndexEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT scene_uuid, ordinal, title, status, location_id
             FROM document_scenes
             WHERE doc_uuid = ?1
             ORDER BY ordinal ASC;",
        )?;
        let mut rows = stmt.query(params![id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_scene_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_summary_row(row: &Row<'_>) -> DocumentRepoResult<DocumentSummary> {
    let raw_id: String = row.get(0)?;
    Ok(DocumentSummary {
        id: parse_uuid(&raw_id)?,
        title: row.get(1)?,
        scene_count: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn parse_scene_row(row: &Row<'_>) -> DocumentRepoResult<SceneIndexEntry> {
    let raw_id: String = row.get(0)?;
    let raw_status: String = row.get(3)?;
    let status = SceneStatus::parse(&raw_status).map_err(|err: ValidationError| {
        DocumentRepoError::InvalidData(err.to_string())
    })?;
    Ok(SceneIndexEntry {
        scene_id: parse_uuid(&raw_id)?,
        number: row.get(1)?,
        title: row.get(2)?,
        status,
        location_id: row.get(4)?,
    })
}

fn parse_uuid(raw: &str) -> DocumentRepoResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|err| DocumentRepoError::InvalidData(format!("invalid uuid `{raw}`: {err}")))
}

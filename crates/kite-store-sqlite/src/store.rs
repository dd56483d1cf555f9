// crates/kite-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Issue Store
// Description: Durable IssueStore backed by SQLite WAL.
// Purpose: Persist issues, scopes, links, and relationships transactionally.
// Dependencies: kite-core, rusqlite, chrono, uuid
// ============================================================================

//! ## Overview
//! This module implements a durable [`IssueStore`] using `SQLite`. A single
//! connection behind a mutex serializes all writers, and every multi-entity
//! mutation runs inside one transaction. `create_or_update` performs its
//! duplicate lookup and write in the same transaction, which closes the
//! check-then-insert window for concurrent failure events targeting one
//! (namespace, issue type, scope).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use kite_core::Issue;
use kite_core::IssueFilters;
use kite_core::IssueId;
use kite_core::IssuePatch;
use kite_core::IssueRelation;
use kite_core::IssueScope;
use kite_core::IssueState;
use kite_core::IssueStore;
use kite_core::IssueType;
use kite_core::Link;
use kite_core::NewIssue;
use kite_core::RelatedIssueSummary;
use kite_core::Severity;
use kite_core::StoreError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` issue store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed issue store with WAL support.
#[derive(Clone)]
pub struct SqliteIssueStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteIssueStore {
    /// Opens an `SQLite`-backed issue store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Store("mutex poisoned".to_string()))
    }
}

impl IssueStore for SqliteIssueStore {
    fn find_all(&self, filters: &IssueFilters) -> Result<(Vec<Issue>, u64), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let result = query_page(&tx, filters)?;
        tx.commit().map_err(db_err)?;
        Ok(result)
    }

    fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let issue = load_issue(&tx, id.as_str())?;
        tx.commit().map_err(db_err)?;
        Ok(issue)
    }

    fn find_duplicate(&self, candidate: &NewIssue) -> Result<Option<Issue>, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let issue = match duplicate_id(&tx, candidate)? {
            Some(id) => load_issue(&tx, &id)?,
            None => None,
        };
        tx.commit().map_err(db_err)?;
        Ok(issue)
    }

    fn create(&self, candidate: &NewIssue) -> Result<Issue, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let id = insert_candidate(&tx, candidate, Utc::now())?;
        let issue = load_issue(&tx, &id)?
            .ok_or_else(|| StoreError::Store("created issue vanished".to_string()))?;
        tx.commit().map_err(db_err)?;
        info!(issue_id = %issue.id, "created issue");
        Ok(issue)
    }

    fn update(&self, id: &IssueId, patch: &IssuePatch) -> Result<Issue, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        apply_patch(&tx, id.as_str(), patch, Utc::now())?;
        let issue = load_issue(&tx, id.as_str())?
            .ok_or_else(|| StoreError::Store("updated issue vanished".to_string()))?;
        tx.commit().map_err(db_err)?;
        Ok(issue)
    }

    fn delete(&self, id: &IssueId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let scope_id: Option<String> = tx
            .query_row("SELECT scope_id FROM issues WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)?;
        let Some(scope_id) = scope_id else {
            return Err(StoreError::NotFound(format!("issue {id} not found")));
        };
        tx.execute(
            "DELETE FROM related_issues WHERE source_id = ?1 OR target_id = ?1",
            params![id.as_str()],
        )
        .map_err(db_err)?;
        tx.execute("DELETE FROM links WHERE issue_id = ?1", params![id.as_str()])
            .map_err(db_err)?;
        tx.execute("DELETE FROM issues WHERE id = ?1", params![id.as_str()]).map_err(db_err)?;
        tx.execute("DELETE FROM issue_scopes WHERE id = ?1", params![scope_id]).map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        info!(issue_id = %id, "deleted issue");
        Ok(())
    }

    fn resolve_by_scope(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
    ) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let now = format_time(Utc::now());
        let changed = tx
            .execute(
                "UPDATE issues SET state = ?1, resolved_at = ?2, updated_at = ?2
                 WHERE state = ?3 AND namespace = ?4 AND scope_id IN (
                     SELECT id FROM issue_scopes
                     WHERE resource_type = ?5 AND resource_name = ?6
                 )",
                params![
                    IssueState::Resolved.as_str(),
                    now,
                    IssueState::Active.as_str(),
                    namespace,
                    resource_type,
                    resource_name
                ],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        info!(resource_type, resource_name, namespace, count = changed, "resolved issues by scope");
        Ok(changed as u64)
    }

    fn add_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError> {
        if source_id == target_id {
            return Err(StoreError::Invalid("cannot relate an issue to itself".to_string()));
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let endpoints: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM issues WHERE id IN (?1, ?2)",
                params![source_id.as_str(), target_id.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if endpoints != 2 {
            return Err(StoreError::NotFound("one or both issues not found".to_string()));
        }
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM related_issues
                 WHERE (source_id = ?1 AND target_id = ?2)
                    OR (source_id = ?2 AND target_id = ?1)",
                params![source_id.as_str(), target_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if exists.is_some() {
            return Err(StoreError::Conflict("relationship already exists".to_string()));
        }
        tx.execute(
            "INSERT INTO related_issues (id, source_id, target_id) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), source_id.as_str(), target_id.as_str()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        info!(source_id = %source_id, target_id = %target_id, "added related issue");
        Ok(())
    }

    fn remove_related(&self, source_id: &IssueId, target_id: &IssueId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let removed = tx
            .execute(
                "DELETE FROM related_issues
                 WHERE (source_id = ?1 AND target_id = ?2)
                    OR (source_id = ?2 AND target_id = ?1)",
                params![source_id.as_str(), target_id.as_str()],
            )
            .map_err(db_err)?;
        if removed == 0 {
            return Err(StoreError::NotFound("relationship not found".to_string()));
        }
        tx.commit().map_err(db_err)?;
        info!(source_id = %source_id, target_id = %target_id, "removed related issue");
        Ok(())
    }

    fn create_or_update(&self, candidate: &NewIssue) -> Result<Issue, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_err)?;
        let now = Utc::now();
        let id = match duplicate_id(&tx, candidate)? {
            Some(id) => {
                let patch = IssuePatch {
                    title: Some(candidate.title.clone()),
                    description: Some(candidate.description.clone()),
                    severity: Some(candidate.severity),
                    issue_type: Some(candidate.issue_type),
                    links: Some(candidate.links.clone()),
                    ..IssuePatch::default()
                };
                apply_patch(&tx, &id, &patch, now)?;
                id
            }
            None => insert_candidate(&tx, candidate, now)?,
        };
        let issue = load_issue(&tx, &id)?
            .ok_or_else(|| StoreError::Store("written issue vanished".to_string()))?;
        tx.commit().map_err(db_err)?;
        Ok(issue)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Invalid("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| StoreError::Unavailable(err.to_string()))
}

/// Opens an `SQLite` connection with durability pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS issue_scopes (
                    id TEXT PRIMARY KEY,
                    resource_type TEXT NOT NULL,
                    resource_name TEXT NOT NULL,
                    resource_namespace TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS issues (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    severity TEXT NOT NULL,
                    issue_type TEXT NOT NULL,
                    state TEXT NOT NULL,
                    detected_at TEXT NOT NULL,
                    resolved_at TEXT,
                    namespace TEXT NOT NULL,
                    scope_id TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (scope_id) REFERENCES issue_scopes(id)
                );
                CREATE TABLE IF NOT EXISTS links (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    url TEXT NOT NULL,
                    issue_id TEXT NOT NULL,
                    FOREIGN KEY (issue_id) REFERENCES issues(id)
                );
                CREATE TABLE IF NOT EXISTS related_issues (
                    id TEXT PRIMARY KEY,
                    source_id TEXT NOT NULL,
                    target_id TEXT NOT NULL,
                    FOREIGN KEY (source_id) REFERENCES issues(id),
                    FOREIGN KEY (target_id) REFERENCES issues(id)
                );
                CREATE INDEX IF NOT EXISTS idx_issues_namespace_type_state
                    ON issues (namespace, issue_type, state);
                CREATE INDEX IF NOT EXISTS idx_issues_scope_id
                    ON issues (scope_id);
                CREATE INDEX IF NOT EXISTS idx_issue_scopes_resource
                    ON issue_scopes (resource_type, resource_name, resource_namespace);
                CREATE INDEX IF NOT EXISTS idx_links_issue_id
                    ON links (issue_id);
                CREATE INDEX IF NOT EXISTS idx_related_issues_source_id
                    ON related_issues (source_id);
                CREATE INDEX IF NOT EXISTS idx_related_issues_target_id
                    ON related_issues (target_id);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::Store(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}

// ============================================================================
// SECTION: Write Helpers
// ============================================================================

/// Inserts a candidate issue with its scope and links; returns the new id.
fn insert_candidate(
    tx: &Transaction<'_>,
    candidate: &NewIssue,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let issue_id = Uuid::new_v4().to_string();
    let scope_id = Uuid::new_v4().to_string();
    let now_text = format_time(now);
    let resource_namespace = if candidate.scope.resource_namespace.is_empty() {
        candidate.namespace.as_str()
    } else {
        candidate.scope.resource_namespace.as_str()
    };
    let state = candidate.state.unwrap_or(IssueState::Active);
    let resolved_at = (state == IssueState::Resolved).then(|| now_text.clone());
    tx.execute(
        "INSERT INTO issue_scopes (id, resource_type, resource_name, resource_namespace)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            scope_id,
            candidate.scope.resource_type,
            candidate.scope.resource_name,
            resource_namespace
        ],
    )
    .map_err(db_err)?;
    tx.execute(
        "INSERT INTO issues (id, title, description, severity, issue_type, state, detected_at,
                             resolved_at, namespace, scope_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            issue_id,
            candidate.title,
            candidate.description,
            candidate.severity.as_str(),
            candidate.issue_type.as_str(),
            state.as_str(),
            now_text,
            resolved_at,
            candidate.namespace,
            scope_id,
            now_text
        ],
    )
    .map_err(db_err)?;
    for link in &candidate.links {
        tx.execute(
            "INSERT INTO links (id, title, url, issue_id) VALUES (?1, ?2, ?3, ?4)",
            params![Uuid::new_v4().to_string(), link.title, link.url, issue_id],
        )
        .map_err(db_err)?;
    }
    Ok(issue_id)
}

/// Applies a patch to an existing issue row and its link set.
fn apply_patch(
    tx: &Transaction<'_>,
    id: &str,
    patch: &IssuePatch,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let current_state: Option<String> = tx
        .query_row("SELECT state FROM issues WHERE id = ?1", params![id], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    let Some(current_state) = current_state else {
        return Err(StoreError::NotFound(format!("issue {id} not found")));
    };
    let was_resolved = current_state == IssueState::Resolved.as_str();

    let mut assignments: Vec<String> = vec!["updated_at = ?".to_string()];
    let mut values: Vec<String> = vec![format_time(now)];
    if let Some(title) = &patch.title {
        assignments.push("title = ?".to_string());
        values.push(title.clone());
    }
    if let Some(description) = &patch.description {
        assignments.push("description = ?".to_string());
        values.push(description.clone());
    }
    if let Some(severity) = patch.severity {
        assignments.push("severity = ?".to_string());
        values.push(severity.as_str().to_string());
    }
    if let Some(issue_type) = patch.issue_type {
        assignments.push("issue_type = ?".to_string());
        values.push(issue_type.as_str().to_string());
    }
    if let Some(state) = patch.state {
        assignments.push("state = ?".to_string());
        values.push(state.as_str().to_string());
        match state {
            IssueState::Resolved => {
                if !was_resolved && patch.resolved_at.is_none() {
                    assignments.push("resolved_at = ?".to_string());
                    values.push(format_time(now));
                }
            }
            IssueState::Active => {
                assignments.push("resolved_at = NULL".to_string());
            }
        }
    }
    if let Some(resolved_at) = patch.resolved_at {
        assignments.push("resolved_at = ?".to_string());
        values.push(format_time(resolved_at));
    }
    let sql = format!("UPDATE issues SET {} WHERE id = ?", assignments.join(", "));
    values.push(id.to_string());
    tx.execute(&sql, params_from_iter(values.iter())).map_err(db_err)?;

    if let Some(links) = &patch.links {
        tx.execute("DELETE FROM links WHERE issue_id = ?1", params![id]).map_err(db_err)?;
        for link in links {
            tx.execute(
                "INSERT INTO links (id, title, url, issue_id) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), link.title, link.url, id],
            )
            .map_err(db_err)?;
        }
    }
    Ok(())
}

/// Returns the id of the active duplicate for the candidate, if any.
fn duplicate_id(tx: &Transaction<'_>, candidate: &NewIssue) -> Result<Option<String>, StoreError> {
    tx.query_row(
        "SELECT issues.id FROM issues
         JOIN issue_scopes ON issues.scope_id = issue_scopes.id
         WHERE issues.namespace = ?1 AND issues.issue_type = ?2 AND issues.state = ?3
           AND issue_scopes.resource_type = ?4 AND issue_scopes.resource_name = ?5
           AND issue_scopes.resource_namespace = ?1",
        params![
            candidate.namespace,
            candidate.issue_type.as_str(),
            IssueState::Active.as_str(),
            candidate.scope.resource_type,
            candidate.scope.resource_name
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

// ============================================================================
// SECTION: Read Helpers
// ============================================================================

/// Column list shared by issue row queries.
const ISSUE_COLUMNS: &str = "issues.id, issues.title, issues.description, issues.severity,
    issues.issue_type, issues.state, issues.detected_at, issues.resolved_at, issues.namespace,
    issues.created_at, issues.updated_at, issue_scopes.id, issue_scopes.resource_type,
    issue_scopes.resource_name, issue_scopes.resource_namespace";

/// Reads one issue row (with scope, children not yet attached) from a
/// result row.
fn row_to_issue(row: &rusqlite::Row<'_>) -> Result<Issue, rusqlite::Error> {
    Ok(Issue {
        id: IssueId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        severity: parse_column(row, 3, Severity::parse)?,
        issue_type: parse_column(row, 4, IssueType::parse)?,
        state: parse_column(row, 5, IssueState::parse)?,
        detected_at: parse_time_column(row, 6)?,
        resolved_at: parse_optional_time_column(row, 7)?,
        namespace: row.get(8)?,
        created_at: parse_time_column(row, 9)?,
        updated_at: parse_time_column(row, 10)?,
        scope: IssueScope {
            id: row.get(11)?,
            resource_type: row.get(12)?,
            resource_name: row.get(13)?,
            resource_namespace: row.get(14)?,
        },
        links: Vec::new(),
        related_from: Vec::new(),
        related_to: Vec::new(),
    })
}

/// Parses an enum column through the provided label parser.
fn parse_column<T>(
    row: &rusqlite::Row<'_>,
    index: usize,
    parse: fn(&str) -> Option<T>,
) -> Result<T, rusqlite::Error> {
    let label: String = row.get(index)?;
    parse(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("unknown label: {label}").into(),
        )
    })
}

/// Parses a required RFC 3339 timestamp column.
fn parse_time_column(
    row: &rusqlite::Row<'_>,
    index: usize,
) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(index)?;
    parse_time(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {text}").into(),
        )
    })
}

/// Parses a nullable RFC 3339 timestamp column.
fn parse_optional_time_column(
    row: &rusqlite::Row<'_>,
    index: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let text: Option<String> = row.get(index)?;
    match text {
        None => Ok(None),
        Some(text) => parse_time(&text).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                format!("invalid timestamp: {text}").into(),
            )
        }),
    }
}

/// Loads one fully materialized issue.
fn load_issue(tx: &Transaction<'_>, id: &str) -> Result<Option<Issue>, StoreError> {
    let sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         JOIN issue_scopes ON issues.scope_id = issue_scopes.id
         WHERE issues.id = ?1"
    );
    let issue = tx.query_row(&sql, params![id], row_to_issue).optional().map_err(db_err)?;
    let Some(mut issue) = issue else {
        return Ok(None);
    };
    attach_children(tx, &mut [&mut issue])?;
    Ok(Some(issue))
}

/// Runs the filtered, paginated issue listing.
fn query_page(
    tx: &Transaction<'_>,
    filters: &IssueFilters,
) -> Result<(Vec<Issue>, u64), StoreError> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    if let Some(namespace) = &filters.namespace {
        conditions.push("issues.namespace = ?");
        values.push(namespace.clone());
    }
    if let Some(severity) = filters.severity {
        conditions.push("issues.severity = ?");
        values.push(severity.as_str().to_string());
    }
    if let Some(issue_type) = filters.issue_type {
        conditions.push("issues.issue_type = ?");
        values.push(issue_type.as_str().to_string());
    }
    if let Some(state) = filters.state {
        conditions.push("issues.state = ?");
        values.push(state.as_str().to_string());
    }
    if let Some(resource_type) = &filters.resource_type {
        conditions.push("issue_scopes.resource_type = ?");
        values.push(resource_type.clone());
    }
    if let Some(resource_name) = &filters.resource_name {
        conditions.push("issue_scopes.resource_name = ?");
        values.push(resource_name.clone());
    }
    if let Some(search) = &filters.search {
        conditions.push("(LOWER(issues.title) LIKE ? OR LOWER(issues.description) LIKE ?)");
        let pattern = format!("%{}%", search.to_lowercase());
        values.push(pattern.clone());
        values.push(pattern);
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM issues
         JOIN issue_scopes ON issues.scope_id = issue_scopes.id{where_clause}"
    );
    let total: i64 = tx
        .query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))
        .map_err(db_err)?;

    let page_sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         JOIN issue_scopes ON issues.scope_id = issue_scopes.id{where_clause}
         ORDER BY issues.detected_at DESC, issues.id ASC
         LIMIT {} OFFSET {}",
        filters.effective_limit(),
        filters.offset
    );
    let mut statement = tx.prepare(&page_sql).map_err(db_err)?;
    let mut issues = statement
        .query_map(params_from_iter(values.iter()), row_to_issue)
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    drop(statement);

    let mut refs: Vec<&mut Issue> = issues.iter_mut().collect();
    attach_children(tx, &mut refs)?;
    Ok((issues, total as u64))
}

/// Attaches links and both relationship sides to the given issues using one
/// batched query per child table.
fn attach_children(tx: &Transaction<'_>, issues: &mut [&mut Issue]) -> Result<(), StoreError> {
    if issues.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = issues.iter().map(|issue| issue.id.as_str().to_string()).collect();
    let placeholders = vec!["?"; ids.len()].join(", ");

    let link_sql = format!(
        "SELECT id, title, url, issue_id FROM links
         WHERE issue_id IN ({placeholders}) ORDER BY rowid"
    );
    let mut statement = tx.prepare(&link_sql).map_err(db_err)?;
    let links = statement
        .query_map(params_from_iter(ids.iter()), |row| {
            let issue_id: String = row.get(3)?;
            Ok((
                issue_id,
                Link {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    url: row.get(2)?,
                    issue_id: IssueId::new(row.get::<_, String>(3)?),
                },
            ))
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    drop(statement);
    for (issue_id, link) in links {
        if let Some(issue) = issues.iter_mut().find(|issue| issue.id.as_str() == issue_id) {
            issue.links.push(link);
        }
    }

    let from_sql = format!(
        "SELECT r.id, r.source_id, r.target_id, i.id, i.title, i.severity, i.issue_type,
                i.state, i.namespace, s.id, s.resource_type, s.resource_name, s.resource_namespace
         FROM related_issues r
         JOIN issues i ON i.id = r.target_id
         JOIN issue_scopes s ON i.scope_id = s.id
         WHERE r.source_id IN ({placeholders})"
    );
    for relation in query_relations(tx, &from_sql, &ids)? {
        let source_id = relation.source_id.as_str().to_string();
        if let Some(issue) = issues.iter_mut().find(|issue| issue.id.as_str() == source_id) {
            issue.related_from.push(relation);
        }
    }

    let to_sql = format!(
        "SELECT r.id, r.source_id, r.target_id, i.id, i.title, i.severity, i.issue_type,
                i.state, i.namespace, s.id, s.resource_type, s.resource_name, s.resource_namespace
         FROM related_issues r
         JOIN issues i ON i.id = r.source_id
         JOIN issue_scopes s ON i.scope_id = s.id
         WHERE r.target_id IN ({placeholders})"
    );
    for relation in query_relations(tx, &to_sql, &ids)? {
        let target_id = relation.target_id.as_str().to_string();
        if let Some(issue) = issues.iter_mut().find(|issue| issue.id.as_str() == target_id) {
            issue.related_to.push(relation);
        }
    }
    Ok(())
}

/// Runs one relationship query with a preloaded counterpart summary.
fn query_relations(
    tx: &Transaction<'_>,
    sql: &str,
    ids: &[String],
) -> Result<Vec<IssueRelation>, StoreError> {
    let mut statement = tx.prepare(sql).map_err(db_err)?;
    let relations = statement
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok(IssueRelation {
                id: row.get(0)?,
                source_id: IssueId::new(row.get::<_, String>(1)?),
                target_id: IssueId::new(row.get::<_, String>(2)?),
                related: RelatedIssueSummary {
                    id: IssueId::new(row.get::<_, String>(3)?),
                    title: row.get(4)?,
                    severity: parse_column(row, 5, Severity::parse)?,
                    issue_type: parse_column(row, 6, IssueType::parse)?,
                    state: parse_column(row, 7, IssueState::parse)?,
                    namespace: row.get(8)?,
                    scope: IssueScope {
                        id: row.get(9)?,
                        resource_type: row.get(10)?,
                        resource_name: row.get(11)?,
                        resource_namespace: row.get(12)?,
                    },
                },
            })
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(relations)
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Maps a rusqlite error into the store error taxonomy.
fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::Store(err.to_string())
}

/// Formats a timestamp with fixed microsecond precision so stored text
/// sorts chronologically.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored RFC 3339 timestamp.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text).ok().map(|time| time.with_timezone(&Utc))
}

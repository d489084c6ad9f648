//! SQLite-backed graph store.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use super::{
    RunRecord, SchemaContext, StoreError, StoreResult, StoredRelationship, TableContext,
    UpsertSummary,
};
use crate::graph::{ColumnNode, EdgeRecord, NodeKind, NodeRecord, TableNode};
use crate::inference::InferenceStatistics;
use crate::schema::Relationship;
use crate::similarity::{SchemaMatch, SearchCandidate, SimilarityIndex};

/// Current store schema version. Bump this when the table layout changes.
const STORE_VERSION: i32 = 1;

const FOREIGN_KEY_EDGE: &str = "HAS_FOREIGN_KEY";
const COLUMN_EDGE: &str = "HAS_COLUMN";

/// Graph store over a single SQLite connection.
///
/// Writers and readers share the connection through a mutex; every upsert
/// is one transaction.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGraphStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteGraphStore {
    /// Open or create the store at `path`.
    ///
    /// If the stored version doesn't match, existing graph data is dropped.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ===== Writes =====

    /// Replace the contents of `run.namespace` with `nodes` and `edges`.
    ///
    /// Nodes and edges are upserted by identity; rows of the namespace that
    /// are absent from this run are deleted. All of it commits or none does.
    pub fn upsert(
        &self,
        run: &RunRecord,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
    ) -> StoreResult<UpsertSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let summary = write_run(&tx, run, nodes, edges)?;
        tx.commit()?;

        info!(
            namespace = %run.namespace,
            run_id = %run.run_id,
            nodes_inserted = summary.nodes_inserted,
            nodes_updated = summary.nodes_updated,
            nodes_removed = summary.nodes_removed,
            edges_inserted = summary.edges_inserted,
            edges_removed = summary.edges_removed,
            "graph namespace committed"
        );
        Ok(summary)
    }

    // ===== Reads =====

    /// Last committed run of a namespace.
    pub fn last_run(&self, namespace: &str) -> StoreResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT namespace, database, run_id, content_hash, completed_at
                 FROM runs WHERE namespace = ?",
                params![namespace],
                read_run,
            )
            .optional()?;
        Ok(run)
    }

    /// Every stored namespace with its last run.
    pub fn namespaces(&self) -> StoreResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT namespace, database, run_id, content_hash, completed_at
             FROM runs ORDER BY namespace",
        )?;
        let runs = stmt
            .query_map([], read_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Number of nodes, optionally within one namespace.
    pub fn node_count(&self, namespace: Option<&str>) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE (?1 IS NULL OR namespace = ?1)",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of edges, optionally within one namespace.
    pub fn edge_count(&self, namespace: Option<&str>) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE (?1 IS NULL OR namespace = ?1)",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Tables and columns as search candidates.
    pub fn search_candidates(&self, namespace: Option<&str>) -> StoreResult<Vec<SearchCandidate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT kind, properties FROM nodes
             WHERE kind IN ('Table', 'Column') AND (?1 IS NULL OR namespace = ?1)
             ORDER BY namespace, id",
        )?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut candidates = Vec::with_capacity(rows.len());
        for (kind, properties) in rows {
            match NodeKind::parse(&kind) {
                Some(NodeKind::Table) => {
                    let table: TableNode = serde_json::from_str(&properties)?;
                    candidates.push(SearchCandidate::table(table.database, table.name));
                }
                Some(NodeKind::Column) => {
                    let column: ColumnNode = serde_json::from_str(&properties)?;
                    candidates.push(SearchCandidate::column(
                        column.database,
                        column.table,
                        column.name,
                    ));
                }
                Some(NodeKind::Database) | None => {
                    return Err(StoreError::Corrupt(format!("unexpected node kind '{kind}'")));
                }
            }
        }
        Ok(candidates)
    }

    /// Fuzzy search over stored table and column names.
    pub fn query_fuzzy(
        &self,
        index: &SimilarityIndex,
        text: &str,
        threshold: f64,
        limit: Option<usize>,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<SchemaMatch>> {
        let candidates = self.search_candidates(namespace)?;
        let matches = index.search(text, &candidates, threshold, limit);
        debug!(query = text, threshold, hits = matches.len(), "fuzzy search");
        Ok(matches)
    }

    /// Tables named in `table_names` (case-insensitive) with their columns and
    /// every relationship touching them.
    pub fn query_context(
        &self,
        table_names: &[String],
        namespace: Option<&str>,
    ) -> StoreResult<SchemaContext> {
        let wanted: HashSet<String> = table_names.iter().map(|t| t.trim().to_uppercase()).collect();
        let conn = self.lock()?;

        let mut table_stmt = conn.prepare(
            "SELECT namespace, properties FROM nodes
             WHERE kind = 'Table' AND (?1 IS NULL OR namespace = ?1)
             ORDER BY namespace, name",
        )?;
        let table_rows = table_stmt
            .query_map(params![namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut column_stmt = conn.prepare(
            "SELECT n.properties FROM edges e
             JOIN nodes n ON n.namespace = e.namespace AND n.id = e.target_id
             WHERE e.namespace = ?1 AND e.source_id = ?2 AND e.kind = ?3",
        )?;

        let mut context = SchemaContext::default();
        let mut found: HashSet<String> = HashSet::new();
        let mut column_ids: HashSet<(String, String)> = HashSet::new();

        for (ns, properties) in table_rows {
            let table: TableNode = serde_json::from_str(&properties)?;
            let key = table.name.to_uppercase();
            if !wanted.contains(&key) {
                continue;
            }
            found.insert(key);

            let mut columns = column_stmt
                .query_map(params![ns, table.id, COLUMN_EDGE], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?
                .iter()
                .map(|p| serde_json::from_str::<ColumnNode>(p))
                .collect::<Result<Vec<_>, _>>()?;
            columns.sort_by_key(|c| c.ordinal);

            column_ids.extend(columns.iter().map(|c| (ns.clone(), c.id.clone())));
            context.tables.push(TableContext {
                namespace: ns,
                table,
                columns,
            });
        }

        let mut edge_stmt = conn.prepare(
            "SELECT namespace, source_id, target_id, properties FROM edges
             WHERE kind = ?1 AND (?2 IS NULL OR namespace = ?2)
             ORDER BY namespace, source_id, target_id",
        )?;
        let edge_rows = edge_stmt
            .query_map(params![FOREIGN_KEY_EDGE, namespace], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (ns, source_id, target_id, properties) in edge_rows {
            let touches = column_ids.contains(&(ns.clone(), source_id))
                || column_ids.contains(&(ns.clone(), target_id));
            if touches {
                let relationship: Relationship = serde_json::from_str(&properties)?;
                context.relationships.push(StoredRelationship {
                    namespace: ns,
                    relationship,
                });
            }
        }

        context.missing = table_names
            .iter()
            .filter(|t| !found.contains(&t.trim().to_uppercase()))
            .cloned()
            .collect();
        Ok(context)
    }

    /// Inferred relationships, highest confidence first.
    pub fn query_inferred(&self, namespace: Option<&str>) -> StoreResult<Vec<StoredRelationship>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT namespace, properties FROM edges
             WHERE kind = ?1 AND origin = 'inferred' AND (?2 IS NULL OR namespace = ?2)
             ORDER BY confidence DESC, namespace, source_id, target_id",
        )?;
        let rows = stmt
            .query_map(params![FOREIGN_KEY_EDGE, namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(namespace, properties)| -> StoreResult<StoredRelationship> {
                Ok(StoredRelationship {
                    namespace,
                    relationship: serde_json::from_str(&properties)?,
                })
            })
            .collect()
    }

    /// Confidence buckets and rule counts of the stored inferred relationships.
    pub fn inferred_statistics(&self, namespace: Option<&str>) -> StoreResult<InferenceStatistics> {
        let inferred = self.query_inferred(namespace)?;
        Ok(InferenceStatistics::from_relationships(
            inferred.iter().map(|r| &r.relationship),
        ))
    }
}

// ============================================================================
// Schema
// ============================================================================

fn init(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    let stored_version: Option<i32> = conn
        .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
            let s: String = row.get(0)?;
            Ok(s.parse().unwrap_or(0))
        })
        .optional()?;

    if matches!(stored_version, Some(v) if v != STORE_VERSION) {
        info!(
            found = stored_version,
            expected = STORE_VERSION,
            "store version mismatch, dropping graph data"
        );
        conn.execute_batch(
            "
            DROP TABLE IF EXISTS nodes;
            DROP TABLE IF EXISTS edges;
            DROP TABLE IF EXISTS runs;
            ",
        )?;
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS nodes (
            namespace TEXT NOT NULL,
            id TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            properties TEXT NOT NULL,
            PRIMARY KEY (namespace, id)
        );

        CREATE TABLE IF NOT EXISTS edges (
            namespace TEXT NOT NULL,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            origin TEXT,
            confidence REAL,
            rule TEXT,
            matched_table TEXT,
            matched_column TEXT,
            properties TEXT NOT NULL,
            PRIMARY KEY (namespace, source_id, target_id, kind)
        );

        CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges (kind, origin);

        CREATE TABLE IF NOT EXISTS runs (
            namespace TEXT PRIMARY KEY,
            database TEXT NOT NULL,
            run_id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            completed_at INTEGER NOT NULL
        );
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
        params![STORE_VERSION.to_string()],
    )?;
    Ok(())
}

fn read_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        namespace: row.get(0)?,
        database: row.get(1)?,
        run_id: row.get(2)?,
        content_hash: row.get(3)?,
        completed_at: row.get(4)?,
    })
}

// ============================================================================
// Upsert
// ============================================================================

type EdgeId = (String, String, String);

fn write_run(
    tx: &Transaction<'_>,
    run: &RunRecord,
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
) -> StoreResult<UpsertSummary> {
    let ns = run.namespace.as_str();
    let mut summary = UpsertSummary::default();

    // Nodes
    let existing_nodes: HashMap<String, String> = {
        let mut stmt = tx.prepare("SELECT id, properties FROM nodes WHERE namespace = ?")?;
        let rows = stmt
            .query_map(params![ns], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        rows
    };

    {
        let mut upsert_node = tx.prepare(
            "INSERT INTO nodes (namespace, id, kind, name, properties) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (namespace, id) DO UPDATE SET
                kind = excluded.kind, name = excluded.name, properties = excluded.properties",
        )?;
        for node in nodes {
            let properties = serde_json::to_string(&node.properties)?;
            match existing_nodes.get(&node.id) {
                Some(stored) if *stored == properties => {
                    summary.nodes_unchanged += 1;
                    continue;
                }
                Some(_) => summary.nodes_updated += 1,
                None => summary.nodes_inserted += 1,
            }
            upsert_node.execute(params![ns, node.id, node.kind.as_str(), node.name, properties])?;
        }
    }

    let live_nodes: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    {
        let mut delete_node = tx.prepare("DELETE FROM nodes WHERE namespace = ? AND id = ?")?;
        for id in existing_nodes.keys().filter(|id| !live_nodes.contains(id.as_str())) {
            summary.nodes_removed += delete_node.execute(params![ns, id])?;
        }
    }

    // Edges
    let existing_edges: HashMap<EdgeId, String> = {
        let mut stmt = tx.prepare(
            "SELECT source_id, target_id, kind, properties FROM edges WHERE namespace = ?",
        )?;
        let rows = stmt
            .query_map(params![ns], |row| {
                Ok(((row.get(0)?, row.get(1)?, row.get(2)?), row.get(3)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        rows
    };

    {
        let mut upsert_edge = tx.prepare(
            "INSERT INTO edges (namespace, source_id, target_id, kind, origin, confidence, rule,
                                matched_table, matched_column, properties)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (namespace, source_id, target_id, kind) DO UPDATE SET
                origin = excluded.origin, confidence = excluded.confidence, rule = excluded.rule,
                matched_table = excluded.matched_table, matched_column = excluded.matched_column,
                properties = excluded.properties",
        )?;
        for edge in edges {
            let properties = serde_json::to_string(&edge.properties)?;
            let id = edge_id(edge);
            match existing_edges.get(&id) {
                Some(stored) if *stored == properties => {
                    summary.edges_unchanged += 1;
                    continue;
                }
                Some(_) => summary.edges_updated += 1,
                None => summary.edges_inserted += 1,
            }
            upsert_edge.execute(params![
                ns,
                edge.source_id,
                edge.target_id,
                edge.kind,
                edge.origin.map(|o| o.as_str()),
                edge.confidence,
                edge.rule,
                edge.matched_table,
                edge.matched_column,
                properties,
            ])?;
        }
    }

    let live_edges: HashSet<EdgeId> = edges.iter().map(edge_id).collect();
    {
        let mut delete_edge = tx.prepare(
            "DELETE FROM edges WHERE namespace = ? AND source_id = ? AND target_id = ? AND kind = ?",
        )?;
        for (source, target, kind) in existing_edges.keys().filter(|k| !live_edges.contains(*k)) {
            summary.edges_removed += delete_edge.execute(params![ns, source, target, kind])?;
        }
    }

    tx.execute(
        "INSERT OR REPLACE INTO runs (namespace, database, run_id, content_hash, completed_at)
         VALUES (?, ?, ?, ?, ?)",
        params![ns, run.database, run.run_id, run.content_hash, run.completed_at],
    )?;

    Ok(summary)
}

fn edge_id(edge: &EdgeRecord) -> EdgeId {
    (
        edge.source_id.clone(),
        edge.target_id.clone(),
        edge.kind.clone(),
    )
}

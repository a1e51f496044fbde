//! SQLite graph store for FlowIndex.
//!
//! Persists each block's money-flow graph (block row, transactions,
//! addresses and flow edges) in one SQLite transaction. The committed height
//! is the highest stored block, so the cursor and the graph can never
//! disagree. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use flowindex_core::GraphStore;
//! use flowindex_storage::sqlite::SqliteGraphStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteGraphStore::open("./flows.db").await?;
//! store.ensure_schema().await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteGraphStore::in_memory().await?;
//! store.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use flowindex_core::error::IndexerError;
use flowindex_core::graph::{FlowEdge, FlowNode, MoneyFlowGraph};
use flowindex_core::store::{GraphStore, StoreConnector};
use flowindex_core::types::Height;

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// Turn a plain path into a SQLite URL that creates the file if missing.
fn sqlite_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{path}?mode=rwc")
    }
}

/// Refusals the scheduler should retry in place rather than restart on:
/// constraint violations and a busy or locked database.
fn is_soft_failure(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return true;
            }
            // Extended result codes keep the primary code in the low byte.
            let primary = db
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff);
            matches!(primary, Some(5) | Some(6)) // SQLITE_BUSY, SQLITE_LOCKED
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Address index key for a node, if it is an address.
fn node_address(node: &FlowNode) -> Option<&str> {
    match node {
        FlowNode::Address { address } => Some(address),
        _ => None,
    }
}

/// SQLite-backed storage for money-flow graphs.
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./flows.db"`) or a full
    /// SQLite URL (`"sqlite:./flows.db?mode=rwc"`). The schema is not
    /// touched; call [`GraphStore::ensure_schema`] before use.
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .connect(&sqlite_url(path))
            .await
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    /// Open a database that must already exist, for inspection.
    ///
    /// Unlike [`open`](Self::open) a missing file is an error rather than a
    /// fresh empty database, even when the URL asks for `mode=rwc`.
    pub async fn open_existing(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}")
        };
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(storage_err)?
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Pinned to a single long-lived connection, since every SQLite
    /// connection to `:memory:` sees its own database. All data is lost when
    /// the store is closed or dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    // ─── Reads ──────────────────────────────────────────────────────────────────

    /// Number of committed blocks.
    pub async fn block_count(&self) -> Result<u64, IndexerError> {
        self.count("SELECT COUNT(*) AS cnt FROM blocks").await
    }

    /// Number of committed transactions.
    pub async fn transaction_count(&self) -> Result<u64, IndexerError> {
        self.count("SELECT COUNT(*) AS cnt FROM transactions").await
    }

    /// Number of distinct addresses seen.
    pub async fn address_count(&self) -> Result<u64, IndexerError> {
        self.count("SELECT COUNT(*) AS cnt FROM addresses").await
    }

    /// Number of stored flow edges.
    pub async fn flow_count(&self) -> Result<u64, IndexerError> {
        self.count("SELECT COUNT(*) AS cnt FROM flows").await
    }

    async fn count(&self, sql: &str) -> Result<u64, IndexerError> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Hash of the committed block at `height`.
    pub async fn block_hash(&self, height: Height) -> Result<Option<String>, IndexerError> {
        let row = sqlx::query("SELECT hash FROM blocks WHERE height = ?")
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<String, _>("hash")))
    }

    /// Height at which `address` first appeared.
    pub async fn first_seen(&self, address: &str) -> Result<Option<Height>, IndexerError> {
        let row = sqlx::query("SELECT first_seen_height FROM addresses WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("first_seen_height") as Height))
    }

    /// Every flow edge into or out of `address`, ordered by height.
    pub async fn flows_for_address(
        &self,
        address: &str,
    ) -> Result<Vec<(Height, FlowEdge)>, IndexerError> {
        let rows = sqlx::query(
            "SELECT height, from_node, to_node, value_sat FROM flows
             WHERE from_address = ? OR to_address = ?
             ORDER BY height, id",
        )
        .bind(address)
        .bind(address)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut flows = Vec::with_capacity(rows.len());
        for row in rows {
            let decode = |col: &str| -> Result<FlowNode, IndexerError> {
                let raw: String = row.get(col);
                serde_json::from_str(&raw).map_err(|e| IndexerError::Storage(e.to_string()))
            };
            let edge = FlowEdge {
                from: decode("from_node")?,
                to: decode("to_node")?,
                value_sat: row.get::<Option<i64>, _>("value_sat").map(|v| v as u64),
            };
            flows.push((row.get::<i64, _>("height") as Height, edge));
        }
        Ok(flows)
    }

    // ─── Writes ─────────────────────────────────────────────────────────────────

    async fn write_graph(
        conn: &mut SqliteConnection,
        graph: &MoneyFlowGraph,
        edges: &[(String, String)],
    ) -> Result<(), sqlx::Error> {
        let height = graph.height as i64;

        sqlx::query(
            "INSERT INTO blocks (height, hash, timestamp, tx_count, indexed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(height)
        .bind(&graph.block_hash)
        .bind(graph.timestamp)
        .bind(graph.tx_count() as i64)
        .bind(Utc::now().timestamp())
        .execute(&mut *conn)
        .await?;

        for tx in &graph.transactions {
            sqlx::query(
                "INSERT INTO transactions
                 (txid, height, is_coinbase, input_count, output_count, total_out_sat)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&tx.txid)
            .bind(height)
            .bind(tx.is_coinbase)
            .bind(tx.input_count as i64)
            .bind(tx.output_count as i64)
            .bind(tx.total_out_sat as i64)
            .execute(&mut *conn)
            .await?;
        }

        for address in &graph.addresses {
            sqlx::query(
                "INSERT INTO addresses (address, first_seen_height) VALUES (?, ?)
                 ON CONFLICT(address) DO NOTHING",
            )
            .bind(address)
            .bind(height)
            .execute(&mut *conn)
            .await?;
        }

        for (edge, (from_json, to_json)) in graph.edges.iter().zip(edges) {
            sqlx::query(
                "INSERT INTO flows
                 (height, from_node, to_node, from_address, to_address, value_sat)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(height)
            .bind(from_json)
            .bind(to_json)
            .bind(node_address(&edge.from))
            .bind(node_address(&edge.to))
            .bind(edge.value_sat.map(|v| v as i64))
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl GraphStore for SqliteGraphStore {
    /// Create tables and enable WAL mode. Safe to run on every start.
    async fn ensure_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS blocks (
                height     INTEGER PRIMARY KEY,
                hash       TEXT    NOT NULL UNIQUE,
                timestamp  INTEGER NOT NULL,
                tx_count   INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            );",
            // Pre-BIP30 coinbases reuse txids, so the height is part of the key.
            "CREATE TABLE IF NOT EXISTS transactions (
                txid          TEXT    NOT NULL,
                height        INTEGER NOT NULL,
                is_coinbase   INTEGER NOT NULL,
                input_count   INTEGER NOT NULL,
                output_count  INTEGER NOT NULL,
                total_out_sat INTEGER NOT NULL,
                PRIMARY KEY (txid, height)
            );",
            "CREATE TABLE IF NOT EXISTS addresses (
                address           TEXT    PRIMARY KEY,
                first_seen_height INTEGER NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS flows (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                height       INTEGER NOT NULL,
                from_node    TEXT    NOT NULL,
                to_node      TEXT    NOT NULL,
                from_address TEXT,
                to_address   TEXT,
                value_sat    INTEGER
            );",
            "CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions (height);",
            "CREATE INDEX IF NOT EXISTS idx_flows_from ON flows (from_address);",
            "CREATE INDEX IF NOT EXISTS idx_flows_to ON flows (to_address);",
            "CREATE INDEX IF NOT EXISTS idx_flows_height ON flows (height);",
        ];
        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        debug!("graph schema ready");
        Ok(())
    }

    async fn last_committed_height(&self) -> Result<Option<Height>, IndexerError> {
        let row = sqlx::query("SELECT MAX(height) AS h FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<Option<i64>, _>("h").map(|h| h as Height))
    }

    async fn persist(&self, graph: &MoneyFlowGraph) -> Result<bool, IndexerError> {
        let edges = graph
            .edges
            .iter()
            .map(|e| -> Result<(String, String), serde_json::Error> {
                Ok((serde_json::to_string(&e.from)?, serde_json::to_string(&e.to)?))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query("SELECT MAX(height) AS h FROM blocks")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        if let Some(committed) = row.get::<Option<i64>, _>("h") {
            if graph.height as i64 != committed + 1 {
                tx.rollback().await.map_err(storage_err)?;
                warn!(height = graph.height, committed, "refusing out-of-order block");
                return Ok(false);
            }
        }

        match Self::write_graph(&mut *tx, graph, &edges).await {
            Ok(()) => {
                tx.commit().await.map_err(storage_err)?;
                debug!(
                    height = graph.height,
                    transactions = graph.tx_count(),
                    edges = graph.edges.len(),
                    "graph stored"
                );
                Ok(true)
            }
            Err(e) if is_soft_failure(&e) => {
                warn!(height = graph.height, error = %e, "graph write refused");
                tx.rollback().await.map_err(storage_err)?;
                Ok(false)
            }
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn close(&self) -> Result<(), IndexerError> {
        self.pool.close().await;
        Ok(())
    }
}

// ─── Connector ───────────────────────────────────────────────────────────────

/// Opens a new pool onto the same database file for every attempt.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    url: String,
}

impl SqliteConnector {
    pub fn new(path: &str) -> Self {
        Self { url: sqlite_url(path) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StoreConnector for SqliteConnector {
    type Store = SqliteGraphStore;

    async fn connect(&self) -> Result<SqliteGraphStore, IndexerError> {
        SqliteGraphStore::open(&self.url).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Durable proposals, orders, journal and account snapshots.
//!
//! # Supersede semantics
//!
//! [`ProposalStore::persist_top3`] marks the account's pending batch as
//! superseded and inserts the new batch in one transaction. Either both
//! happen or neither does, so there is never more than one pending batch
//! per account. Rows are never deleted.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use riskdesk_core::{
    AccountSnapshot, CandidateTrade, Order, OrderStatus, ProposalStatus, ProposedTrade, Regime,
    Result, RiskError,
};

/// Most rows one proposal batch may hold.
pub const MAX_BATCH: usize = 3;

/// One audit record of an order status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub order_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

impl JournalEntry {
    #[must_use]
    pub fn new(
        order_id: Uuid,
        from_status: Option<OrderStatus>,
        to_status: OrderStatus,
        note: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            from_status,
            to_status,
            note: note.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Entity-level persistence used by the proposer and the order workflows.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Supersedes the account's pending batch and inserts up to three new rows.
    ///
    /// An empty `ranked` slice is a no-op and leaves the pending batch in place.
    async fn persist_top3(
        &self,
        account_id: &str,
        ranked: &[CandidateTrade],
    ) -> Result<Vec<ProposedTrade>>;

    async fn pending(&self, account_id: &str) -> Result<Vec<ProposedTrade>>;

    /// All rows for the account, newest first.
    async fn history(&self, account_id: &str, limit: u32) -> Result<Vec<ProposedTrade>>;

    /// Pending -> Approved.
    async fn approve(&self, id: i64) -> Result<ProposedTrade>;

    /// Pending -> Rejected.
    async fn reject(&self, id: i64) -> Result<ProposedTrade>;

    async fn save_order(&self, order: &Order) -> Result<()>;

    async fn load_order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn append_journal(&self, entry: &JournalEntry) -> Result<()>;

    async fn journal(&self, order_id: Uuid) -> Result<Vec<JournalEntry>>;

    async fn record_snapshot(&self, snapshot: &AccountSnapshot) -> Result<()>;

    async fn latest_snapshot(&self, account_id: &str) -> Result<Option<AccountSnapshot>>;
}

fn db(err: sqlx::Error) -> RiskError {
    RiskError::Persistence(err.to_string())
}

fn decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| RiskError::Persistence(format!("bad decimal in {column}: {e}")))
}

type ProposalRow = (
    i64,
    String,
    String,
    i64,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const PROPOSAL_COLUMNS: &str =
    "id, account_id, batch_id, rank, candidate_json, status, created_at, decided_at";

fn proposal_from_row(row: ProposalRow) -> Result<ProposedTrade> {
    let (id, account_id, batch_id, rank, candidate_json, status, created_at, decided_at) = row;
    Ok(ProposedTrade {
        id,
        account_id,
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| RiskError::Persistence(format!("bad batch id: {e}")))?,
        rank: u32::try_from(rank)
            .map_err(|_| RiskError::Persistence(format!("bad rank {rank}")))?,
        candidate: serde_json::from_str(&candidate_json)
            .map_err(|e| RiskError::Persistence(format!("bad candidate json: {e}")))?,
        status: ProposalStatus::parse(&status)
            .ok_or_else(|| RiskError::Persistence(format!("bad proposal status '{status}'")))?,
        created_at,
        decided_at,
    })
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails or migrations fail.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db)?;
        Self::migrate(pool).await
    }

    /// Creates an in-memory database, used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn in_memory() -> Result<Self> {
        // Each connection to sqlite::memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db)?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RiskError::Persistence(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }

    async fn fetch_proposal(&self, id: i64) -> Result<Option<ProposedTrade>> {
        let row = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposed_trades WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.map(proposal_from_row).transpose()
    }

    async fn decide(&self, id: i64, next: ProposalStatus) -> Result<ProposedTrade> {
        let result = sqlx::query(
            "UPDATE proposed_trades SET status = ?1, decided_at = ?2 WHERE id = ?3 AND status = 'pending'",
        )
        .bind(next.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        let current = self.fetch_proposal(id).await?;
        match current {
            None => Err(RiskError::Validation(format!("proposal {id} not found"))),
            Some(row) if result.rows_affected() == 0 => {
                Err(RiskError::transition(row.status, next))
            }
            Some(row) => {
                tracing::info!(proposal_id = id, status = %next, "Proposal decided");
                Ok(row)
            }
        }
    }
}

#[async_trait]
impl ProposalStore for SqliteStore {
    async fn persist_top3(
        &self,
        account_id: &str,
        ranked: &[CandidateTrade],
    ) -> Result<Vec<ProposedTrade>> {
        let batch_id = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(db)?;

        let superseded = sqlx::query(
            "UPDATE proposed_trades SET status = 'superseded', decided_at = ?1 WHERE account_id = ?2 AND status = 'pending'",
        )
        .bind(now)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .rows_affected();

        let mut inserted = Vec::with_capacity(ranked.len().min(MAX_BATCH));
        for (index, candidate) in ranked.iter().take(MAX_BATCH).enumerate() {
            let rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let candidate_json = serde_json::to_string(candidate)
                .map_err(|e| RiskError::Persistence(format!("encode candidate: {e}")))?;
            let id = sqlx::query(
                r"
                INSERT INTO proposed_trades
                    (account_id, batch_id, rank, benchmark, strategy, target_metric, score, candidate_json, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9)
                ",
            )
            .bind(account_id)
            .bind(batch_id.to_string())
            .bind(i64::from(rank))
            .bind(&candidate.benchmark)
            .bind(format!("{:?}", candidate.strategy))
            .bind(candidate.target.as_str())
            .bind(candidate.score.map(|s| s.to_string()))
            .bind(candidate_json)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db)?
            .last_insert_rowid();

            inserted.push(ProposedTrade {
                id,
                account_id: account_id.to_string(),
                batch_id,
                rank,
                candidate: candidate.clone(),
                status: ProposalStatus::Pending,
                created_at: now,
                decided_at: None,
            });
        }

        tx.commit().await.map_err(db)?;

        tracing::info!(
            account_id,
            %batch_id,
            inserted = inserted.len(),
            superseded,
            "Persisted proposal batch"
        );
        Ok(inserted)
    }

    async fn pending(&self, account_id: &str) -> Result<Vec<ProposedTrade>> {
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposed_trades WHERE account_id = ?1 AND status = 'pending' ORDER BY rank"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.into_iter().map(proposal_from_row).collect()
    }

    async fn history(&self, account_id: &str, limit: u32) -> Result<Vec<ProposedTrade>> {
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposed_trades WHERE account_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.into_iter().map(proposal_from_row).collect()
    }

    async fn approve(&self, id: i64) -> Result<ProposedTrade> {
        self.decide(id, ProposalStatus::Approved).await
    }

    async fn reject(&self, id: i64) -> Result<ProposedTrade> {
        self.decide(id, ProposalStatus::Rejected).await
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let order_json = serde_json::to_string(order)
            .map_err(|e| RiskError::Persistence(format!("encode order: {e}")))?;
        sqlx::query(
            r"
            INSERT INTO orders (id, account_id, status, broker_order_id, proposal_id, order_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                broker_order_id = excluded.broker_order_id,
                order_json = excluded.order_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(order.id.to_string())
        .bind(&order.account_id)
        .bind(order.status().as_str())
        .bind(order.broker_order_id())
        .bind(order.proposal_id)
        .bind(order_json)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn load_order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT order_json FROM orders WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|(json,)| {
            serde_json::from_str(&json)
                .map_err(|e| RiskError::Persistence(format!("bad order json: {e}")))
        })
        .transpose()
    }

    async fn append_journal(&self, entry: &JournalEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO journal_entries (order_id, from_status, to_status, note, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(entry.order_id.to_string())
        .bind(entry.from_status.map(OrderStatus::as_str))
        .bind(entry.to_status.as_str())
        .bind(&entry.note)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn journal(&self, order_id: Uuid) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, (Option<String>, String, String, DateTime<Utc>)>(
            "SELECT from_status, to_status, note, recorded_at FROM journal_entries WHERE order_id = ?1 ORDER BY id",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.into_iter()
            .map(|(from, to, note, recorded_at)| {
                let parse = |s: &str| {
                    OrderStatus::parse(s).ok_or_else(|| {
                        RiskError::Persistence(format!("bad order status '{s}'"))
                    })
                };
                Ok(JournalEntry {
                    order_id,
                    from_status: from.as_deref().map(parse).transpose()?,
                    to_status: parse(&to)?,
                    note,
                    recorded_at,
                })
            })
            .collect()
    }

    async fn record_snapshot(&self, snapshot: &AccountSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO account_snapshots (account_id, net_liquidation, margin_used, regime, vix, captured_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&snapshot.account_id)
        .bind(snapshot.net_liquidation.to_string())
        .bind(snapshot.margin_used.to_string())
        .bind(snapshot.regime.as_str())
        .bind(snapshot.vix.to_string())
        .bind(snapshot.captured_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn latest_snapshot(&self, account_id: &str) -> Result<Option<AccountSnapshot>> {
        let row = sqlx::query_as::<_, (String, String, String, String, DateTime<Utc>)>(
            "SELECT net_liquidation, margin_used, regime, vix, captured_at FROM account_snapshots WHERE account_id = ?1 ORDER BY captured_at DESC, id DESC LIMIT 1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.map(|(nlv, margin, regime, vix, captured_at)| {
            Ok(AccountSnapshot {
                account_id: account_id.to_string(),
                net_liquidation: decimal("net_liquidation", &nlv)?,
                margin_used: decimal("margin_used", &margin)?,
                regime: Regime::from_str(&regime)
                    .map_err(|e| RiskError::Persistence(e.to_string()))?,
                vix: decimal("vix", &vix)?,
                captured_at,
            })
        })
        .transpose()
    }
}

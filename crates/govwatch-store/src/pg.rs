//! Postgres store on sqlx. The schema is created idempotently at
//! startup; every statement goes through the shared pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use govwatch_core::types::ActiveProposal;
use govwatch_core::{GovWatchError, Result};

use crate::{SpaceRecord, Store};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS space (
    ens                  VARCHAR PRIMARY KEY,
    start_block          BIGINT NOT NULL,
    last_processed_block BIGINT
);

CREATE TABLE IF NOT EXISTS proposal (
    proposal_id VARCHAR(66) PRIMARY KEY,
    question_id VARCHAR(66) NOT NULL,
    ens         VARCHAR NOT NULL REFERENCES space (ens),
    tx_hash     VARCHAR(66) NOT NULL,
    happened_at TIMESTAMPTZ NOT NULL,
    snapshot_id VARCHAR NOT NULL,
    started_at  BIGINT NOT NULL,
    finished_at BIGINT NOT NULL,
    timeout     BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS question_idx ON proposal (question_id);
CREATE INDEX IF NOT EXISTS ens_idx ON proposal (ens);

CREATE TABLE IF NOT EXISTS notification (
    tx_hash      VARCHAR(66) NOT NULL,
    block        BIGINT NOT NULL,
    channel_name VARCHAR NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tx_hash, channel_name)
);
"#;

fn store_err(e: sqlx::Error) -> GovWatchError {
    GovWatchError::Store(e.to_string())
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and make sure the schema exists.
    pub async fn connect(uri: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(uri)
            .await
            .map_err(store_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Validate that the host is reachable and credentials work.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1 + 1")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_space(row: &PgRow) -> std::result::Result<SpaceRecord, sqlx::Error> {
    Ok(SpaceRecord {
        ens: row.try_get("ens")?,
        start_block: row.try_get::<i64, _>("start_block")? as u64,
        last_processed_block: row
            .try_get::<Option<i64>, _>("last_processed_block")?
            .map(|b| b as u64),
    })
}

fn row_to_proposal(row: &PgRow) -> std::result::Result<ActiveProposal, sqlx::Error> {
    Ok(ActiveProposal {
        ens: row.try_get("ens")?,
        proposal_id: row.try_get("proposal_id")?,
        question_id: row.try_get("question_id")?,
        tx_hash: row.try_get("tx_hash")?,
        happened_at: row.try_get::<DateTime<Utc>, _>("happened_at")?,
        snapshot_id: row.try_get("snapshot_id")?,
        started_at: row.try_get::<i64, _>("started_at")? as u64,
        finished_at: row.try_get::<i64, _>("finished_at")? as u64,
        timeout: row.try_get::<i64, _>("timeout")? as u64,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn find_spaces(&self, enss: &[String]) -> Result<Vec<SpaceRecord>> {
        let rows = sqlx::query(
            "SELECT ens, start_block, last_processed_block FROM space WHERE ens = ANY($1)",
        )
        .bind(enss)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(|row| row_to_space(row).map_err(store_err))
            .collect()
    }

    async fn insert_spaces(&self, spaces: &[SpaceRecord]) -> Result<()> {
        for space in spaces {
            sqlx::query(
                "INSERT INTO space (ens, start_block, last_processed_block) VALUES ($1, $2, $3)",
            )
            .bind(&space.ens)
            .bind(space.start_block as i64)
            .bind(space.last_processed_block.map(|b| b as i64))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        }
        Ok(())
    }

    async fn update_space(&self, ens: &str, last_processed_block: u64) -> Result<()> {
        sqlx::query("UPDATE space SET last_processed_block = $1 WHERE ens = $2")
            .bind(last_processed_block as i64)
            .bind(ens)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn insert_proposal(&self, proposal: &ActiveProposal) -> Result<()> {
        sqlx::query(
            "INSERT INTO proposal \
             (proposal_id, question_id, ens, tx_hash, happened_at, snapshot_id, started_at, finished_at, timeout) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (proposal_id) DO NOTHING",
        )
        .bind(&proposal.proposal_id)
        .bind(&proposal.question_id)
        .bind(&proposal.ens)
        .bind(&proposal.tx_hash)
        .bind(proposal.happened_at)
        .bind(&proposal.snapshot_id)
        .bind(proposal.started_at as i64)
        .bind(proposal.finished_at as i64)
        .bind(proposal.timeout as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_proposal_by_question_id(
        &self,
        question_id: &str,
    ) -> Result<Option<ActiveProposal>> {
        let row = sqlx::query(
            "SELECT proposal_id, question_id, ens, tx_hash, happened_at, snapshot_id, \
             started_at, finished_at, timeout \
             FROM proposal WHERE question_id = $1 LIMIT 1",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(|row| row_to_proposal(&row).map_err(store_err))
            .transpose()
    }

    async fn record_delivery(&self, tx_hash: &str, block: u64, channel: &str) -> Result<()> {
        // ON CONFLICT keeps a concurrent double-send from erroring;
        // the ledger read before dispatch makes it rare anyway.
        sqlx::query(
            "INSERT INTO notification (tx_hash, block, channel_name) VALUES ($1, $2, $3) \
             ON CONFLICT (tx_hash, channel_name) DO NOTHING",
        )
        .bind(tx_hash)
        .bind(block as i64)
        .bind(channel)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn delivered_channels(&self, tx_hash: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT channel_name FROM notification WHERE tx_hash = $1")
            .bind(tx_hash)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.iter()
            .map(|row| row.try_get("channel_name").map_err(store_err))
            .collect()
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;

use super::{LedgerStore, LedgerTx};
use crate::errors::{LedgerError, Result};
use crate::models::{
    ClientPayout, Contract, ContractId, ContractStatus, Job, JobId, PayableJob, Profile,
    ProfileId, ProfessionRevenue,
};
use crate::reporting::ReportWindow;

/// Raw `profiles` row. The type tag is free text in storage and is checked on read.
#[derive(Debug, FromRow)]
struct ProfileRow {
    id: i64,
    first_name: String,
    last_name: String,
    profession: String,
    #[sqlx(rename = "type")]
    kind: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = LedgerError;

    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(Profile {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            profession: row.profession,
            kind: row.kind.parse()?,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ContractRow {
    id: i64,
    terms: String,
    status: String,
    client_id: i64,
    contractor_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = LedgerError;

    fn try_from(row: ContractRow) -> Result<Self> {
        Ok(Contract {
            id: row.id,
            terms: row.terms,
            status: row.status.parse()?,
            client_id: row.client_id,
            contractor_id: row.contractor_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn contracts_from(rows: Vec<ContractRow>) -> Result<Vec<Contract>> {
    rows.into_iter().map(Contract::try_from).collect()
}

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .connect(database_url)
            .await?;

        Ok(PgLedgerStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgLedgerStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT * FROM profiles WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        let row = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT * FROM contracts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Contract::try_from).transpose()
    }

    async fn active_contracts_for(&self, profile_id: ProfileId) -> Result<Vec<Contract>> {
        let rows = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT * FROM contracts
            WHERE (client_id = $1 OR contractor_id = $1)
                AND status <> 'terminated'
            ORDER BY id
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        contracts_from(rows)
    }

    async fn unpaid_jobs_for(&self, profile_id: ProfileId) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.* FROM jobs j
            JOIN contracts c ON j.contract_id = c.id
            WHERE (c.client_id = $1 OR c.contractor_id = $1)
                AND c.status <> 'terminated'
                AND j.paid = FALSE
            ORDER BY j.id
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn revenue_by_profession(
        &self,
        window: &ReportWindow,
        limit: u32,
    ) -> Result<Vec<ProfessionRevenue>> {
        let ranked = sqlx::query_as::<_, ProfessionRevenue>(
            r#"
            SELECT p.profession, SUM(j.price) AS total_revenue
            FROM jobs j
            JOIN contracts c ON j.contract_id = c.id
            JOIN profiles p ON c.contractor_id = p.id
            WHERE j.paid = TRUE
                AND j.payment_date BETWEEN $1 AND $2
                AND c.status <> 'new'
            GROUP BY p.profession
            ORDER BY total_revenue DESC, p.profession ASC
            LIMIT $3
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ranked)
    }

    async fn payouts_by_client(
        &self,
        window: &ReportWindow,
        limit: u32,
    ) -> Result<Vec<ClientPayout>> {
        let ranked = sqlx::query_as::<_, ClientPayout>(
            r#"
            SELECT c.client_id,
                p.first_name || ' ' || p.last_name AS full_name,
                SUM(j.price) AS total_paid
            FROM jobs j
            JOIN contracts c ON j.contract_id = c.id
            JOIN profiles p ON c.client_id = p.id
            WHERE j.paid = TRUE
                AND j.payment_date BETWEEN $1 AND $2
            GROUP BY c.client_id, p.first_name, p.last_name
            ORDER BY total_paid DESC, c.client_id ASC
            LIMIT $3
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ranked)
    }
}

/// Wraps a sqlx transaction; dropping it without commit rolls back
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_profiles(&mut self, ids: &[ProfileId]) -> Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT * FROM profiles
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Profile::try_from).collect()
    }

    async fn adjust_balance(&mut self, id: ProfileId, delta: Decimal) -> Result<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles
            SET balance = balance + $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;

        Profile::try_from(row)
    }

    async fn lock_payable_job(
        &mut self,
        job_id: JobId,
        client_id: ProfileId,
    ) -> Result<Option<PayableJob>> {
        let contract = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT * FROM contracts
            WHERE id = (SELECT contract_id FROM jobs WHERE id = $1)
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(contract) = contract.map(Contract::try_from).transpose()? else {
            return Ok(None);
        };

        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };
        if job.paid
            || contract.client_id != client_id
            || contract.status != ContractStatus::InProgress
        {
            return Ok(None);
        }

        Ok(Some(PayableJob { job, contract }))
    }

    async fn mark_job_paid(&mut self, job_id: JobId, paid_at: DateTime<Utc>) -> Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET paid = TRUE, payment_date = $2, updated_at = $2
            WHERE id = $1 AND paid = FALSE
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(paid_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        job.ok_or(LedgerError::JobNotPayable(job_id))
    }

    async fn jobs_for_contract(&mut self, contract_id: ContractId) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs WHERE contract_id = $1 ORDER BY id
            "#,
        )
        .bind(contract_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(jobs)
    }

    async fn set_contract_status(
        &mut self,
        contract_id: ContractId,
        status: ContractStatus,
    ) -> Result<Contract> {
        let row = sqlx::query_as::<_, ContractRow>(
            r#"
            UPDATE contracts
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(contract_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Contract::try_from(row)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

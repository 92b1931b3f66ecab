//! # PostgreSQL Store
//!
//! A [`LifecycleStore`] over `sqlx` and PostgreSQL. A unit of work is one
//! database transaction; `read_for_update` takes the row lock with
//! `SELECT … FOR UPDATE`, so concurrent transitions of one entity queue
//! on the database rather than in process. Dropping an uncommitted
//! [`PgUnitOfWork`] rolls the transaction back.
//!
//! ## Configuration
//!
//! | Variable                       | Default  |
//! |--------------------------------|----------|
//! | `DATABASE_URL`                 | required |
//! | `LIMS_DB_MAX_CONNECTIONS`      | 10       |
//! | `LIMS_DB_ACQUIRE_TIMEOUT_SECS` | 5        |
//!
//! Embedded migrations under `migrations/` run on connect.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use lims_core::{EntityId, EntityType, OrganizationId, Timestamp, UserId, ValidationError};
use lims_state::Status;

use crate::audit::{verify_chain, ChainIntegrity, ChainedAuditRecord, GENESIS_HASH};
use crate::error::EngineError;
use crate::record::{
    ApprovalAction, AuditAction, AuditRecord, EntityKey, EntityRecord, ReviewState,
};
use crate::store::{AuditSink, EntityStore, LifecycleStore, UnitOfWork};

/// Connection settings for [`PgLifecycleStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct PgConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl std::fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConfig")
            .field("database_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl PgConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ValidationError::InvalidConfig("DATABASE_URL is not set".into()))?;
        let max_connections = parse_or("LIMS_DB_MAX_CONNECTIONS", &lookup, Self::DEFAULT_MAX_CONNECTIONS)?;
        let timeout_secs = parse_or(
            "LIMS_DB_ACQUIRE_TIMEOUT_SECS",
            &lookup,
            Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;
        if max_connections == 0 {
            return Err(ValidationError::InvalidConfig(
                "LIMS_DB_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Open a pool and apply the embedded migrations.
    pub async fn connect(&self) -> Result<PgPool, EngineError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await?;
        tracing::info!(max_connections = self.max_connections, "connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| EngineError::Storage(format!("migration failed: {e}")))?;
        tracing::info!("database migrations applied");
        Ok(pool)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ValidationError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidConfig(format!("{name}: invalid value {raw:?}"))),
    }
}

fn table(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Sample => "samples",
        EntityType::Test => "tests",
        EntityType::Order => "orders",
        EntityType::Invoice => "invoices",
    }
}

const TEST_COLUMNS: &str = "id, organization_id, order_id, status, updated_at, \
    assigned_analyst_id, submitted_by, submitted_at, reviewer_id, reviewed_at, review_comments, \
    approver_id, approved_at, approval_comments";

const PLAIN_COLUMNS: &str = "id, organization_id, order_id, status, updated_at, \
    NULL::uuid AS assigned_analyst_id, NULL::uuid AS submitted_by, \
    NULL::timestamptz AS submitted_at, NULL::uuid AS reviewer_id, \
    NULL::timestamptz AS reviewed_at, NULL::text AS review_comments, \
    NULL::uuid AS approver_id, NULL::timestamptz AS approved_at, \
    NULL::text AS approval_comments";

fn select(entity_type: EntityType, tail: &str) -> String {
    let columns = match entity_type {
        EntityType::Test => TEST_COLUMNS,
        _ => PLAIN_COLUMNS,
    };
    format!("SELECT {columns} FROM {} {tail}", table(entity_type))
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    organization_id: Uuid,
    order_id: Option<Uuid>,
    status: String,
    updated_at: DateTime<Utc>,
    assigned_analyst_id: Option<Uuid>,
    submitted_by: Option<Uuid>,
    submitted_at: Option<DateTime<Utc>>,
    reviewer_id: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    review_comments: Option<String>,
    approver_id: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    approval_comments: Option<String>,
}

impl EntityRow {
    fn into_record(self, entity_type: EntityType) -> Result<EntityRecord, EngineError> {
        let status = Status::parse(entity_type, &self.status).map_err(|err| {
            tracing::error!(entity_type = %entity_type, id = %self.id, "corrupt stored status: {err}");
            EngineError::from(err)
        })?;
        let user = |id: Option<Uuid>| id.map(UserId::from_uuid);
        let at = |ts: Option<DateTime<Utc>>| ts.map(Timestamp::from_utc);
        let review = (entity_type == EntityType::Test).then(|| ReviewState {
            assigned_analyst_id: user(self.assigned_analyst_id),
            submitted_by: user(self.submitted_by),
            submitted_at: at(self.submitted_at),
            reviewer_id: user(self.reviewer_id),
            reviewed_at: at(self.reviewed_at),
            review_comments: self.review_comments,
            approver_id: user(self.approver_id),
            approved_at: at(self.approved_at),
            approval_comments: self.approval_comments,
        });
        Ok(EntityRecord {
            entity_type,
            id: EntityId::from_uuid(self.id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            order_id: self.order_id.map(EntityId::from_uuid),
            status,
            updated_at: Timestamp::from_utc(self.updated_at),
            review,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    organization_id: Uuid,
    user_id: Option<Uuid>,
    entity_type: String,
    entity_id: Uuid,
    action: String,
    previous_status: String,
    new_status: String,
    occurred_at: DateTime<Utc>,
    metadata: Option<serde_json::Value>,
    previous_hash: String,
    record_hash: String,
}

impl AuditRow {
    fn into_chained(self) -> Result<ChainedAuditRecord, EngineError> {
        let entity_type = EntityType::from_name(&self.entity_type)
            .map_err(|e| EngineError::Storage(format!("corrupt audit row: {e}")))?;
        let action = AuditAction::from_name(&self.action)
            .ok_or_else(|| EngineError::Storage(format!("unknown audit action {:?}", self.action)))?;
        Ok(ChainedAuditRecord {
            record: AuditRecord {
                organization_id: OrganizationId::from_uuid(self.organization_id),
                user_id: self.user_id.map(UserId::from_uuid),
                entity_type,
                entity_id: EntityId::from_uuid(self.entity_id),
                action,
                previous_status: Status::parse(entity_type, &self.previous_status)?,
                new_status: Status::parse(entity_type, &self.new_status)?,
                timestamp: Timestamp::from_utc(self.occurred_at),
                metadata: self.metadata,
            },
            previous_hash: self.previous_hash,
            record_hash: self.record_hash,
        })
    }
}

/// [`LifecycleStore`] backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgLifecycleStore {
    pool: PgPool,
}

impl PgLifecycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with `config` and apply migrations.
    pub async fn connect(config: &PgConfig) -> Result<Self, EngineError> {
        Ok(Self::new(config.connect().await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Stored audit records of one entity, in append order.
    pub async fn audit_log_for(&self, key: EntityKey) -> Result<Vec<ChainedAuditRecord>, EngineError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT organization_id, user_id, entity_type, entity_id, action, previous_status,
             new_status, occurred_at, metadata, previous_hash, record_hash
             FROM audit_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY seq ASC",
        )
        .bind(key.entity_type.as_str())
        .bind(*key.id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditRow::into_chained).collect()
    }

    /// Walk the audit chain of one entity.
    pub async fn verify_audit_chain(&self, key: EntityKey) -> Result<ChainIntegrity, EngineError> {
        Ok(verify_chain(&self.audit_log_for(key).await?))
    }

    async fn fetch(&self, entity_type: EntityType, tail: &str, bind: Uuid) -> Result<Vec<EntityRecord>, EngineError> {
        let sql = select(entity_type, tail);
        let rows = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(bind)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|r| r.into_record(entity_type)).collect()
    }
}

impl LifecycleStore for PgLifecycleStore {
    type Work = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, EngineError> {
        Ok(PgUnitOfWork {
            tx: self.pool.begin().await?,
        })
    }

    async fn create(
        &self,
        entity_type: EntityType,
        organization_id: OrganizationId,
        order_id: Option<EntityId>,
    ) -> Result<EntityRecord, EngineError> {
        let record = EntityRecord::new(entity_type, organization_id, order_id);
        let sql = format!(
            "INSERT INTO {} (id, organization_id, order_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)",
            table(entity_type)
        );
        sqlx::query(&sql)
            .bind(*record.id.as_uuid())
            .bind(*organization_id.as_uuid())
            .bind(order_id.map(|id| *id.as_uuid()))
            .bind(record.status.as_str())
            .bind(*record.updated_at.as_datetime())
            .execute(&self.pool)
            .await?;
        tracing::debug!(entity = %record.key(), status = %record.status, "entity created");
        Ok(record)
    }

    async fn find(&self, key: EntityKey) -> Result<Option<EntityRecord>, EngineError> {
        let mut found = self.fetch(key.entity_type, "WHERE id = $1", *key.id.as_uuid()).await?;
        Ok(found.pop())
    }

    async fn list_by_status(
        &self,
        organization_id: OrganizationId,
        status: Status,
    ) -> Result<Vec<EntityRecord>, EngineError> {
        let entity_type = status.entity_type();
        let sql = select(
            entity_type,
            "WHERE organization_id = $1 AND status = $2 ORDER BY updated_at ASC, id ASC",
        );
        let rows = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(*organization_id.as_uuid())
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|r| r.into_record(entity_type)).collect()
    }

    async fn tests_for_order(&self, order_id: EntityId) -> Result<Vec<EntityRecord>, EngineError> {
        self.fetch(
            EntityType::Test,
            "WHERE order_id = $1 ORDER BY updated_at ASC, id ASC",
            *order_id.as_uuid(),
        )
        .await
    }
}

/// One PostgreSQL transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl EntityStore for PgUnitOfWork {
    async fn read_for_update(&mut self, key: EntityKey) -> Result<EntityRecord, EngineError> {
        let sql = select(key.entity_type, "WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(*key.id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| EngineError::not_found(key.entity_type, key.id))?;
        row.into_record(key.entity_type)
    }

    async fn write_status(
        &mut self,
        key: EntityKey,
        status: Status,
        at: Timestamp,
    ) -> Result<(), EngineError> {
        let sql = format!(
            "UPDATE {} SET status = $2, updated_at = $3 WHERE id = $1",
            table(key.entity_type)
        );
        let result = sqlx::query(&sql)
            .bind(*key.id.as_uuid())
            .bind(status.as_str())
            .bind(*at.as_datetime())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(EngineError::not_found(key.entity_type, key.id));
        }
        Ok(())
    }

    async fn write_review(&mut self, key: EntityKey, review: ReviewState) -> Result<(), EngineError> {
        if key.entity_type != EntityType::Test {
            return Err(EngineError::Storage(format!("{key} has no review columns")));
        }
        let user = |id: Option<UserId>| id.map(|u| *u.as_uuid());
        let at = |ts: Option<Timestamp>| ts.map(|t| *t.as_datetime());
        sqlx::query(
            "UPDATE tests SET assigned_analyst_id = $2, submitted_by = $3, submitted_at = $4,
             reviewer_id = $5, reviewed_at = $6, review_comments = $7,
             approver_id = $8, approved_at = $9, approval_comments = $10
             WHERE id = $1",
        )
        .bind(*key.id.as_uuid())
        .bind(user(review.assigned_analyst_id))
        .bind(user(review.submitted_by))
        .bind(at(review.submitted_at))
        .bind(user(review.reviewer_id))
        .bind(at(review.reviewed_at))
        .bind(review.review_comments)
        .bind(user(review.approver_id))
        .bind(at(review.approved_at))
        .bind(review.approval_comments)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

impl AuditSink for PgUnitOfWork {
    async fn append(&mut self, record: AuditRecord) -> Result<(), EngineError> {
        // The entity's row lock is held, so its chain tail cannot move.
        let previous: Option<String> = sqlx::query_scalar(
            "SELECT record_hash FROM audit_log WHERE entity_type = $1 AND entity_id = $2
             ORDER BY seq DESC LIMIT 1",
        )
        .bind(record.entity_type.as_str())
        .bind(*record.entity_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        let linked = ChainedAuditRecord::link(record, previous.as_deref().unwrap_or(GENESIS_HASH));
        let r = &linked.record;

        sqlx::query(
            "INSERT INTO audit_log (organization_id, user_id, entity_type, entity_id, action,
             previous_status, new_status, occurred_at, metadata, previous_hash, record_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(*r.organization_id.as_uuid())
        .bind(r.user_id.map(|u| *u.as_uuid()))
        .bind(r.entity_type.as_str())
        .bind(*r.entity_id.as_uuid())
        .bind(r.action.as_str())
        .bind(r.previous_status.as_str())
        .bind(r.new_status.as_str())
        .bind(*r.timestamp.as_datetime())
        .bind(&r.metadata)
        .bind(&linked.previous_hash)
        .bind(&linked.record_hash)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_approval(&mut self, action: ApprovalAction) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO approval_actions (organization_id, test_id, user_id, action, level,
             comments, occurred_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*action.organization_id.as_uuid())
        .bind(*action.test_id.as_uuid())
        .bind(*action.user_id.as_uuid())
        .bind(action.action.as_str())
        .bind(action.level.as_i16())
        .bind(action.comments)
        .bind(*action.timestamp.as_datetime())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), EngineError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = PgConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://lims@localhost/lims")]))
            .unwrap();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_apply() {
        let config = PgConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://lims@localhost/lims"),
            ("LIMS_DB_MAX_CONNECTIONS", "32"),
            ("LIMS_DB_ACQUIRE_TIMEOUT_SECS", " 12 "),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.acquire_timeout, Duration::from_secs(12));
    }

    #[test]
    fn missing_url_is_a_config_error() {
        assert!(PgConfig::from_lookup(lookup(&[])).is_err());
        assert!(PgConfig::from_lookup(lookup(&[("DATABASE_URL", " ")])).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let url = ("DATABASE_URL", "postgres://localhost/lims");
        assert!(PgConfig::from_lookup(lookup(&[url, ("LIMS_DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(PgConfig::from_lookup(lookup(&[url, ("LIMS_DB_MAX_CONNECTIONS", "0")])).is_err());
    }

    #[test]
    fn debug_redacts_url() {
        let config =
            PgConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://lims:secret@db/lims")])).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_rows_select_review_columns() {
        assert!(select(EntityType::Test, "").contains("reviewer_id, reviewed_at"));
        assert!(select(EntityType::Sample, "").contains("NULL::uuid AS reviewer_id"));
        assert!(select(EntityType::Invoice, "WHERE id = $1").starts_with("SELECT id,"));
    }
}

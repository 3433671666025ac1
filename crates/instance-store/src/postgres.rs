use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{InstanceRecord, InstanceStore, Result, SagaId, StoreError};

const PRIMARY_KEY: &str = "saga_instances_pkey";

/// PostgreSQL-backed instance store.
#[derive(Clone)]
pub struct PostgresInstanceStore {
    pool: PgPool,
}

impl PostgresInstanceStore {
    /// Creates a new PostgreSQL instance store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<InstanceRecord> {
        Ok(InstanceRecord {
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            saga_name: row.try_get("saga_name")?,
            saga_data_name: row.try_get("saga_data_name")?,
            saga_data: row.try_get("saga_data")?,
            current_step: row.try_get("current_step")?,
            end_state: row.try_get("end_state")?,
            compensating: row.try_get("compensating")?,
        })
    }
}

#[async_trait]
impl InstanceStore for PostgresInstanceStore {
    async fn find(&self, saga_name: &str, saga_id: SagaId) -> Result<Option<InstanceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT saga_id, saga_name, saga_data_name, saga_data, current_step, end_state, compensating
            FROM saga_instances
            WHERE saga_name = $1 AND saga_id = $2
            "#,
        )
        .bind(saga_name)
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn save(&self, record: &InstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_instances
                (saga_id, saga_name, saga_data_name, saga_data, current_step, end_state, compensating)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.saga_id.as_uuid())
        .bind(&record.saga_name)
        .bind(&record.saga_data_name)
        .bind(&record.saga_data)
        .bind(record.current_step)
        .bind(record.end_state)
        .bind(record.compensating)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(PRIMARY_KEY)
            {
                return StoreError::AlreadyExists {
                    saga_name: record.saga_name.clone(),
                    saga_id: record.saga_id,
                };
            }
            StoreError::Database(e)
        })?;

        tracing::debug!(
            saga_name = %record.saga_name,
            saga_id = %record.saga_id,
            "Saga instance saved"
        );

        Ok(())
    }

    async fn update(&self, record: &InstanceRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_instances
            SET saga_data_name = $3,
                saga_data = $4,
                current_step = $5,
                end_state = $6,
                compensating = $7,
                updated_at = NOW()
            WHERE saga_name = $1 AND saga_id = $2
            "#,
        )
        .bind(&record.saga_name)
        .bind(record.saga_id.as_uuid())
        .bind(&record.saga_data_name)
        .bind(&record.saga_data)
        .bind(record.current_step)
        .bind(record.end_state)
        .bind(record.compensating)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound {
                saga_name: record.saga_name.clone(),
                saga_id: record.saga_id,
            });
        }

        Ok(())
    }
}

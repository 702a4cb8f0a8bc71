use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use incidents_common::{
    AddressDirectory, AddressSummary, AuditEntry, AuditLog, BusinessLicense, Config, FireIncident,
    IncidentError, IncidentSource, Page, PageRequest, PoliceIncident, User, UserStore,
};

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres-backed store. Incident tables are read from `data_pool`, which
/// is the same pool as `pool` unless a separate data database is configured.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    data_pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool, data_pool: PgPool) -> Self {
        Self { pool, data_pool }
    }

    /// Single database for both application and incident tables.
    pub fn single(pool: PgPool) -> Self {
        Self {
            data_pool: pool.clone(),
            pool,
        }
    }

    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        if !config.has_separate_data_db() {
            info!("Connected to database");
            return Ok(Self::single(pool));
        }

        let data_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.data_database_url)
            .await?;
        info!("Connected to application and incident-data databases");

        Ok(Self::new(pool, data_pool))
    }

    /// Apply the embedded migrations to the application database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> IncidentError {
    IncidentError::Database(e.to_string())
}

// ---------------------------------------------------------------------------
// Incident reads
// ---------------------------------------------------------------------------

#[async_trait]
impl IncidentSource for PgStore {
    async fn fire_incidents_at(&self, address: &str) -> Result<Vec<FireIncident>, IncidentError> {
        let rows = sqlx::query_as::<_, (i64, String, Option<DateTime<Utc>>, Option<String>)>(
            r#"
            SELECT id, incident_address, alarm_datetime, actual_nfirs_incident_type_description
            FROM fire_incidents
            WHERE incident_address = $1
            ORDER BY id
            "#,
        )
        .bind(address)
        .fetch_all(&self.data_pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, incident_address, alarm_datetime, reason)| FireIncident {
                id,
                incident_address,
                alarm_datetime,
                actual_nfirs_incident_type_description: reason,
            })
            .collect())
    }

    async fn police_incidents_at(
        &self,
        address: &str,
    ) -> Result<Vec<PoliceIncident>, IncidentError> {
        let rows = sqlx::query_as::<_, (i64, String, Option<DateTime<Utc>>, Option<String>)>(
            r#"
            SELECT id, incident_address, call_datetime, final_cad_call_type_description
            FROM police_incidents
            WHERE incident_address = $1
            ORDER BY id
            "#,
        )
        .bind(address)
        .fetch_all(&self.data_pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, incident_address, call_datetime, reason)| PoliceIncident {
                id,
                incident_address,
                call_datetime,
                final_cad_call_type_description: reason,
            })
            .collect())
    }

    async fn businesses_at(&self, address: &str) -> Result<Vec<BusinessLicense>, IncidentError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String)>(
            r#"
            SELECT id, business_address, name, business_service_description
            FROM business_licenses
            WHERE business_address = $1
            ORDER BY id
            "#,
        )
        .bind(address)
        .fetch_all(&self.data_pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, business_address, name, business_service_description)| BusinessLicense {
                    id,
                    business_address,
                    name,
                    business_service_description,
                },
            )
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

type UserRow = (i64, String, String, DateTime<Utc>);

fn user_from_row((id, name, email, date_created): UserRow) -> User {
    User {
        id,
        name,
        email,
        date_created,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, IncidentError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, date_created FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(user_from_row))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, IncidentError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, date_created FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(user_from_row))
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<User, IncidentError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, date_created)
            VALUES ($1, $2, now())
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, name, email, date_created
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(user_from_row(row))
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[async_trait]
impl AuditLog for PgStore {
    async fn record(&self, entry: AuditEntry) -> Result<(), IncidentError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, method, path, status, accessed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.method)
        .bind(&entry.path)
        .bind(i32::from(entry.status))
        .bind(entry.accessed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Address summaries
// ---------------------------------------------------------------------------

#[async_trait]
impl AddressDirectory for PgStore {
    async fn list_addresses(
        &self,
        request: PageRequest,
    ) -> Result<Page<AddressSummary>, IncidentError> {
        // Column and direction come from closed enums, never from user text.
        let sql = format!(
            "SELECT address, fire_count, police_count FROM address_summaries \
             ORDER BY {} {}, address ASC LIMIT $1 OFFSET $2",
            request.sort.column(),
            request.order.sql(),
        );

        let (total,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM address_summaries")
            .fetch_one(&self.data_pool)
            .await
            .map_err(db_err)?;

        let rows = sqlx::query_as::<_, (String, i64, i64)>(&sql)
            .bind(i64::from(request.per_page))
            .bind(request.offset() as i64)
            .fetch_all(&self.data_pool)
            .await
            .map_err(db_err)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(|(address, fire_count, police_count)| AddressSummary {
                    address,
                    fire_count,
                    police_count,
                })
                .collect(),
            page: request.page,
            per_page: request.per_page,
            total: total.max(0) as u64,
        })
    }
}

//! SQLite backend over a `sqlx` pool.
//!
//! Uniqueness is enforced by the schema (see `migrations/`), so dedup is a
//! single `INSERT ... ON CONFLICT DO NOTHING` followed by a point lookup.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use mrqa_core::{
    parse_acq_date, AcquisitionInstance, InstanceDetails, InstanceKey, ParamField, ParamId,
    ParamSet, PARAM_FIELD_COUNT,
};

use crate::backend::{ParamCount, ParamInsert, ProtocolCount, StoreBackend, StoredInstance};
use crate::error::{Result, StoreError};
use crate::pattern::ProtocolPattern;

const ISO_DAY: &str = "%Y-%m-%d";

/// Statements over the 16 parameter columns, built once.
struct ParamSql {
    find: String,
    insert: String,
    select_by_id: String,
}

impl ParamSql {
    fn new() -> Self {
        let cols: Vec<&str> = ParamField::ALL.iter().map(|f| f.as_str()).collect();
        let col_csv = cols.join(", ");
        let where_all = cols
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let placeholders = vec!["?"; cols.len()].join(", ");
        Self {
            find: format!("SELECT param_id FROM acq_param WHERE {where_all}"),
            insert: format!(
                "INSERT INTO acq_param ({col_csv}) VALUES ({placeholders}) ON CONFLICT DO NOTHING"
            ),
            select_by_id: format!("SELECT {col_csv} FROM acq_param WHERE param_id = ?"),
        }
    }
}

pub struct SqliteBackend {
    pool: SqlitePool,
    sql: ParamSql,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `url` and apply migrations.
    ///
    /// In-memory URLs are pinned to one connection: every SQLite connection
    /// to `:memory:` is its own database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { max_connections.max(1) };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        info!(url, max_connections, "SQLite store connected");
        Self::from_pool(pool).await
    }

    /// A private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("acquisition schema migrated");
        Ok(Self {
            pool,
            sql: ParamSql::new(),
        })
    }
}

fn count_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn row_to_params(row: &SqliteRow) -> Result<ParamSet> {
    let mut values: [String; PARAM_FIELD_COUNT] = Default::default();
    for (i, slot) in values.iter_mut().enumerate() {
        *slot = row.try_get::<String, _>(i)?;
    }
    Ok(ParamSet::new(values))
}

fn row_to_instance(row: &SqliteRow) -> Result<StoredInstance> {
    Ok(StoredInstance {
        seq: row.try_get("acq_id")?,
        instance: AcquisitionInstance {
            key: InstanceKey {
                acq_time: row.try_get("AcqTime")?,
                acq_date: row.try_get("AcqDate")?,
                sub_id: row.try_get("SubID")?,
                series_number: row.try_get("SeriesNumber")?,
            },
            details: InstanceDetails {
                operator: row.try_get("Operator")?,
                shims: row.try_get("Shims")?,
                station: row.try_get("Station")?,
            },
            param_id: row.try_get("param_id")?,
        },
    })
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    async fn find_or_insert_params(&self, params: &ParamSet) -> Result<ParamInsert> {
        let mut insert = sqlx::query(&self.sql.insert);
        for value in params.values() {
            insert = insert.bind(value.as_str());
        }
        let created = insert.execute(&self.pool).await?.rows_affected() > 0;

        let param_id = self.find_params(params).await?.ok_or_else(|| {
            StoreError::Unavailable("parameter set missing immediately after insert".to_string())
        })?;
        Ok(ParamInsert { param_id, created })
    }

    async fn find_params(&self, params: &ParamSet) -> Result<Option<ParamId>> {
        let mut find = sqlx::query_scalar::<_, i64>(&self.sql.find);
        for value in params.values() {
            find = find.bind(value.as_str());
        }
        Ok(find.fetch_optional(&self.pool).await?)
    }

    async fn get_params(&self, id: ParamId) -> Result<Option<ParamSet>> {
        let row = sqlx::query(&self.sql.select_by_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_params).transpose()
    }

    async fn has_instance(&self, key: &InstanceKey) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT acq_id FROM acq \
             WHERE AcqTime = ? AND AcqDate = ? AND SubID = ? AND SeriesNumber = ?",
        )
        .bind(&key.acq_time)
        .bind(&key.acq_date)
        .bind(&key.sub_id)
        .bind(&key.series_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn insert_instance_if_absent(&self, instance: &AcquisitionInstance) -> Result<bool> {
        let acq_day = instance.key.acq_day().map(|d| d.format(ISO_DAY).to_string());
        let result = sqlx::query(
            "INSERT INTO acq \
             (param_id, AcqTime, AcqDate, SubID, SeriesNumber, acq_day, Operator, Shims, Station) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (AcqTime, AcqDate, SubID, SeriesNumber) DO NOTHING",
        )
        .bind(instance.param_id)
        .bind(&instance.key.acq_time)
        .bind(&instance.key.acq_date)
        .bind(&instance.key.sub_id)
        .bind(&instance.key.series_number)
        .bind(acq_day)
        .bind(&instance.details.operator)
        .bind(&instance.details.shims)
        .bind(&instance.details.station)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn instances_since(&self, cutoff: NaiveDate) -> Result<Vec<StoredInstance>> {
        let rows = sqlx::query(
            "SELECT acq_id, param_id, AcqTime, AcqDate, SubID, SeriesNumber, \
             Operator, Shims, Station \
             FROM acq WHERE acq_day > ? ORDER BY acq_id",
        )
        .bind(cutoff.format(ISO_DAY).to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_instance).collect()
    }

    async fn count_by_param(
        &self,
        project: &ProtocolPattern,
        sequence: &ProtocolPattern,
    ) -> Result<Vec<ParamCount>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT a.param_id, COUNT(*) FROM acq a \
             JOIN acq_param p ON p.param_id = a.param_id \
             WHERE p.Project GLOB ? AND p.SequenceName GLOB ? \
             GROUP BY a.param_id",
        )
        .bind(project.as_glob())
        .bind(sequence.as_glob())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(param_id, n)| ParamCount { param_id, count: count_u64(n) })
            .collect())
    }

    async fn count_by_protocol(&self) -> Result<Vec<ProtocolCount>> {
        let rows = sqlx::query_as::<_, (String, String, i64, i64)>(
            "SELECT p.Project, p.SequenceName, a.param_id, COUNT(*) FROM acq a \
             JOIN acq_param p ON p.param_id = a.param_id \
             GROUP BY a.param_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(project, sequence_name, param_id, n)| ProtocolCount {
                project,
                sequence_name,
                param_id,
                count: count_u64(n),
            })
            .collect())
    }

    async fn latest_acq_day(&self, project: &ProtocolPattern) -> Result<Option<NaiveDate>> {
        let latest = sqlx::query_scalar::<_, Option<String>>(
            "SELECT MAX(a.acq_day) FROM acq a \
             JOIN acq_param p ON p.param_id = a.param_id \
             WHERE p.Project GLOB ?",
        )
        .bind(project.as_glob())
        .fetch_one(&self.pool)
        .await?;
        latest
            .map(|day| parse_acq_date(&day).map_err(StoreError::from))
            .transpose()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

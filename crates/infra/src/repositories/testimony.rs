use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_value};
use surrealdb::{Surreal, engine::remote::ws::Client};
use testimony_domain::DomainResult;
use testimony_domain::error::DomainError;
use testimony_domain::ports::BoxFuture;
use testimony_domain::ports::testimony::TestimonyRepository;
use testimony_domain::testimony::{Page, Testimony, TestimonyFilter, TestimonySort};
use testimony_domain::timestamps::parse_timestamp;
use testimony_domain::util::{format_rfc3339, unix_ms};

use crate::db::{self, DbConfig};

const TESTIMONY_PROJECTION: &str = "testimony_id, witness_id, execution_fact_id, \
     <string>timestamp AS timestamp, timestamp_ms, recorded_at_ms";

#[derive(Clone)]
pub struct SurrealTestimonyRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealTestimonyRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    pub async fn connect(db_config: &DbConfig) -> anyhow::Result<Self> {
        Ok(Self::with_client(db::connect(db_config).await?))
    }

    fn map_surreal_error(err: surrealdb::Error) -> DomainError {
        let message = err.to_string();
        if message.to_lowercase().contains("already exists") {
            return DomainError::Storage(format!("testimony already exists: {message}"));
        }
        DomainError::Storage(format!("surreal query failed: {message}"))
    }

    fn build_payload(testimony: &Testimony) -> DomainResult<SurrealTestimonyCreateRow> {
        let timestamp = format_rfc3339(testimony.timestamp).map_err(|err| {
            DomainError::Storage(format!(
                "timestamp of '{}' has no rfc3339 form: {err}",
                testimony.id
            ))
        })?;
        Ok(SurrealTestimonyCreateRow {
            testimony_id: testimony.id.clone(),
            witness_id: testimony.witness_id.clone(),
            execution_fact_id: testimony.execution_fact_id.clone(),
            timestamp,
            timestamp_ms: unix_ms(testimony.timestamp),
            recorded_at_ms: testimony.recorded_at_ms,
        })
    }

    /// The read-back only counts once the `CREATE` itself succeeded; otherwise
    /// it would hand back a row that was already there.
    fn created_row(
        inserted: Result<Vec<Value>, surrealdb::Error>,
        read_back: Result<Vec<Value>, surrealdb::Error>,
    ) -> DomainResult<Testimony> {
        inserted.map_err(Self::map_surreal_error)?;
        let rows = read_back.map_err(Self::map_surreal_error)?;
        Self::decode_rows(rows)?
            .pop()
            .ok_or_else(|| DomainError::Storage("create returned no row".to_string()))
    }

    fn map_row(row: SurrealTestimonyRow) -> DomainResult<Testimony> {
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            DomainError::Storage(format!(
                "invalid testimony timestamp '{}' for '{}'",
                row.timestamp, row.testimony_id
            ))
        })?;
        Ok(Testimony {
            id: row.testimony_id,
            witness_id: row.witness_id,
            execution_fact_id: row.execution_fact_id,
            timestamp,
            recorded_at_ms: row.recorded_at_ms,
        })
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<Testimony>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealTestimonyRow>(row)
                    .map_err(|err| DomainError::Storage(format!("invalid testimony row: {err}")))
                    .and_then(Self::map_row)
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct SurrealTestimonyCreateRow {
    testimony_id: String,
    witness_id: String,
    execution_fact_id: String,
    timestamp: String,
    timestamp_ms: i64,
    recorded_at_ms: i64,
}

#[derive(Debug, Deserialize)]
struct SurrealTestimonyRow {
    testimony_id: String,
    witness_id: String,
    execution_fact_id: String,
    timestamp: String,
    recorded_at_ms: i64,
}

fn where_clause(filter: &TestimonyFilter) -> String {
    let mut conditions = Vec::new();
    if filter.witness_id.is_some() {
        conditions.push("witness_id = $witness_id");
    }
    if filter.execution_fact_id.is_some() {
        conditions.push("execution_fact_id = $execution_fact_id");
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn order_clause(sort: TestimonySort) -> &'static str {
    match sort {
        TestimonySort::Recorded => " ORDER BY recorded_at_ms ASC, testimony_id ASC",
        TestimonySort::Timestamp => {
            " ORDER BY timestamp_ms ASC, recorded_at_ms ASC, testimony_id ASC"
        }
    }
}

fn find_statement(filter: &TestimonyFilter, sort: TestimonySort) -> String {
    format!(
        "SELECT {TESTIMONY_PROJECTION} FROM testimony{}{} LIMIT $limit START $skip",
        where_clause(filter),
        order_clause(sort)
    )
}

fn count_statement(filter: &TestimonyFilter) -> String {
    format!(
        "SELECT count() AS total FROM testimony{} GROUP ALL",
        where_clause(filter)
    )
}

impl TestimonyRepository for SurrealTestimonyRepository {
    fn create(&self, testimony: &Testimony) -> BoxFuture<'_, DomainResult<Testimony>> {
        let payload = Self::build_payload(testimony);
        let testimony_id = testimony.id.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let payload = to_value(payload?)
                .map_err(|err| DomainError::Storage(format!("invalid payload: {err}")))?;
            let statement = format!(
                "CREATE type::thing('testimony', $testimony_id) SET \
                    testimony_id = $payload.testimony_id, \
                    witness_id = $payload.witness_id, \
                    execution_fact_id = $payload.execution_fact_id, \
                    timestamp = <datetime>$payload.timestamp, \
                    timestamp_ms = $payload.timestamp_ms, \
                    recorded_at_ms = $payload.recorded_at_ms \
                    RETURN NONE; \
                 SELECT {TESTIMONY_PROJECTION} FROM testimony \
                    WHERE testimony_id = $testimony_id LIMIT 1"
            );
            let mut response = client
                .query(statement)
                .bind(("testimony_id", testimony_id))
                .bind(("payload", payload))
                .await
                .map_err(Self::map_surreal_error)?;
            let inserted = response.take::<Vec<Value>>(0);
            let read_back = response.take::<Vec<Value>>(1);
            Self::created_row(inserted, read_back)
        })
    }

    fn count(&self, filter: &TestimonyFilter) -> BoxFuture<'_, DomainResult<u64>> {
        let statement = count_statement(filter);
        let filter = filter.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(statement)
                .bind(("witness_id", filter.witness_id))
                .bind(("execution_fact_id", filter.execution_fact_id))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(Self::map_surreal_error)?;
            // GROUP ALL yields no row at all when nothing matches
            Ok(rows
                .first()
                .and_then(|row| row.get("total"))
                .and_then(Value::as_u64)
                .unwrap_or(0))
        })
    }

    fn find(
        &self,
        filter: &TestimonyFilter,
        page: Page,
        sort: TestimonySort,
    ) -> BoxFuture<'_, DomainResult<Vec<Testimony>>> {
        let statement = find_statement(filter, sort);
        let filter = filter.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(statement)
                .bind(("witness_id", filter.witness_id))
                .bind(("execution_fact_id", filter.execution_fact_id))
                .bind(("limit", page.limit as u64))
                .bind(("skip", page.skip as u64))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(Self::map_surreal_error)?;
            Self::decode_rows(rows)
        })
    }
}

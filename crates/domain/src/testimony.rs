use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::DomainResult;
use crate::error::DomainError;
use crate::identifiers::is_valid_identifier;
use crate::ports::BoxFuture;
use crate::ports::testimony::TestimonyRepository;
use crate::references::{ReferenceKind, ReferenceVerifier};
use crate::timestamps::validate_timestamp;
use crate::util::{now_ms, uuid_v7};

pub const DEFAULT_LIST_SIZE: usize = 100;
pub const MAX_LIST_SIZE: usize = 1000;

/// A witness asserting it observed an execution fact at `timestamp`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Testimony {
    pub id: String,
    pub witness_id: String,
    pub execution_fact_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip)]
    pub recorded_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TestimonyCreate {
    pub witness_id: String,
    pub execution_fact_id: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestimonyFilter {
    pub witness_id: Option<String>,
    pub execution_fact_id: Option<String>,
}

impl TestimonyFilter {
    /// Drops blank criteria so `?witnessId=` behaves like an absent filter.
    pub fn normalized(&self) -> Self {
        Self {
            witness_id: non_blank(self.witness_id.as_deref()),
            execution_fact_id: non_blank(self.execution_fact_id.as_deref()),
        }
    }

    pub fn matches(&self, testimony: &Testimony) -> bool {
        self.witness_id
            .as_deref()
            .is_none_or(|id| id == testimony.witness_id)
            && self
                .execution_fact_id
                .as_deref()
                .is_none_or(|id| id == testimony.execution_fact_id)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub size: Option<usize>,
    pub from: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestimonySort {
    #[default]
    Recorded,
    Timestamp,
}

#[derive(Clone, Debug, Default)]
pub struct TestimonyQuery {
    pub filter: TestimonyFilter,
    pub page: PageRequest,
    pub sort: TestimonySort,
}

#[derive(Clone, Copy, Debug)]
pub struct ListConfig {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_LIST_SIZE,
            max_size: MAX_LIST_SIZE,
        }
    }
}

impl ListConfig {
    /// A missing or zero `size` falls back to the default; anything above the
    /// ceiling is clamped.
    pub fn resolve(&self, request: PageRequest) -> Page {
        let max_size = self.max_size.max(1);
        let limit = request
            .size
            .filter(|size| *size > 0)
            .unwrap_or(self.default_size)
            .clamp(1, max_size);
        Page {
            skip: request.from.unwrap_or(0),
            limit,
        }
    }
}

#[derive(Clone)]
pub struct TestimonyService {
    repository: Arc<dyn TestimonyRepository>,
    references: ReferenceVerifier,
    list_config: ListConfig,
}

impl TestimonyService {
    pub fn new(repository: Arc<dyn TestimonyRepository>, references: ReferenceVerifier) -> Self {
        Self {
            repository,
            references,
            list_config: ListConfig::default(),
        }
    }

    pub fn with_list_config(mut self, list_config: ListConfig) -> Self {
        self.list_config = list_config;
        self
    }

    /// Validates the input, confirms both references upstream and stores the
    /// testimony. Nothing is written unless every check passes.
    pub async fn create(
        &self,
        correlation_id: &str,
        input: TestimonyCreate,
    ) -> DomainResult<Testimony> {
        let timestamp = validate_testimony_create(&input)?;
        self.references
            .verify_pair(&input.witness_id, &input.execution_fact_id, correlation_id)
            .await?;

        let testimony = Testimony {
            id: uuid_v7(),
            witness_id: input.witness_id,
            execution_fact_id: input.execution_fact_id,
            timestamp,
            recorded_at_ms: now_ms(),
        };
        self.repository.create(&testimony).await
    }

    pub async fn list(&self, query: TestimonyQuery) -> DomainResult<Vec<Testimony>> {
        let filter = query.filter.normalized();
        let page = self.list_config.resolve(query.page);
        self.repository.find(&filter, page, query.sort).await
    }

    pub async fn count(&self, filter: &TestimonyFilter) -> DomainResult<u64> {
        self.repository.count(&filter.normalized()).await
    }
}

fn validate_testimony_create(input: &TestimonyCreate) -> DomainResult<OffsetDateTime> {
    if !is_valid_identifier(&input.witness_id) {
        return Err(DomainError::InvalidIdentifier {
            kind: ReferenceKind::Witness,
            id: input.witness_id.clone(),
        });
    }
    if !is_valid_identifier(&input.execution_fact_id) {
        return Err(DomainError::InvalidIdentifier {
            kind: ReferenceKind::ExecutionFact,
            id: input.execution_fact_id.clone(),
        });
    }
    validate_timestamp(&input.timestamp).map_err(|reason| DomainError::InvalidTimestamp {
        value: input.timestamp.clone(),
        reason,
    })
}

/// Keeps testimonies in a `Vec`, so append order is recording order.
#[derive(Clone, Default)]
pub struct InMemoryTestimonyRepository {
    store: Arc<RwLock<Vec<Testimony>>>,
}

impl InMemoryTestimonyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn snapshot(&self) -> Vec<Testimony> {
        self.store.read().await.clone()
    }
}

impl TestimonyRepository for InMemoryTestimonyRepository {
    fn create(&self, testimony: &Testimony) -> BoxFuture<'_, DomainResult<Testimony>> {
        let testimony = testimony.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            if items.iter().any(|item| item.id == testimony.id) {
                return Err(DomainError::Storage(format!(
                    "testimony '{}' already exists",
                    testimony.id
                )));
            }
            items.push(testimony.clone());
            Ok(testimony)
        })
    }

    fn count(&self, filter: &TestimonyFilter) -> BoxFuture<'_, DomainResult<u64>> {
        let filter = filter.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let items = store.read().await;
            Ok(items.iter().filter(|item| filter.matches(item)).count() as u64)
        })
    }

    fn find(
        &self,
        filter: &TestimonyFilter,
        page: Page,
        sort: TestimonySort,
    ) -> BoxFuture<'_, DomainResult<Vec<Testimony>>> {
        let filter = filter.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let items = store.read().await;
            let mut matching: Vec<_> = items
                .iter()
                .filter(|item| filter.matches(item))
                .cloned()
                .collect();
            if sort == TestimonySort::Timestamp {
                // stable, so recording order breaks ties
                matching.sort_by_key(|item| item.timestamp);
            }
            Ok(matching
                .into_iter()
                .skip(page.skip)
                .take(page.limit)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn testimony(id: &str, witness_id: &str, timestamp: OffsetDateTime) -> Testimony {
        Testimony {
            id: id.to_string(),
            witness_id: witness_id.to_string(),
            execution_fact_id: "e32db94c-f2ca-4804-a7d8-90d35f65b57b".to_string(),
            timestamp,
            recorded_at_ms: 0,
        }
    }

    #[test]
    fn page_defaults_and_clamps() {
        let config = ListConfig {
            default_size: 20,
            max_size: 50,
        };
        assert_eq!(
            config.resolve(PageRequest::default()),
            Page { skip: 0, limit: 20 }
        );
        assert_eq!(
            config.resolve(PageRequest {
                size: Some(0),
                from: Some(3),
            }),
            Page { skip: 3, limit: 20 }
        );
        assert_eq!(
            config.resolve(PageRequest {
                size: Some(500),
                from: None,
            }),
            Page { skip: 0, limit: 50 }
        );
    }

    #[test]
    fn filter_ignores_blank_values_and_ands_criteria() {
        let filter = TestimonyFilter {
            witness_id: Some("  ".into()),
            execution_fact_id: Some("e32db94c-f2ca-4804-a7d8-90d35f65b57b".into()),
        }
        .normalized();
        assert_eq!(filter.witness_id, None);

        let item = testimony("a", "w-1", datetime!(2004-01-01 00:00 UTC));
        assert!(filter.matches(&item));
        assert!(TestimonyFilter::default().matches(&item));

        let both = TestimonyFilter {
            witness_id: Some("w-2".into()),
            execution_fact_id: Some("e32db94c-f2ca-4804-a7d8-90d35f65b57b".into()),
        };
        assert!(!both.matches(&item));
    }

    #[test]
    fn create_validation_order_is_witness_then_execution_fact_then_timestamp() {
        let err = validate_testimony_create(&TestimonyCreate {
            witness_id: "123".into(),
            execution_fact_id: "456".into(),
            timestamp: "nope".into(),
        })
        .expect_err("invalid");
        assert_eq!(err.to_string(), "Given invalid witness id: 123.");

        let err = validate_testimony_create(&TestimonyCreate {
            witness_id: "9fcb46b8-2d23-40d9-8b21-8678bacc563d".into(),
            execution_fact_id: "456".into(),
            timestamp: "nope".into(),
        })
        .expect_err("invalid");
        assert_eq!(err.to_string(), "Given invalid execution fact id: 456.");

        let err = validate_testimony_create(&TestimonyCreate {
            witness_id: "9fcb46b8-2d23-40d9-8b21-8678bacc563d".into(),
            execution_fact_id: "e32db94c-f2ca-4804-a7d8-90d35f65b57b".into(),
            timestamp: "9999-01-01T00:00:00Z".into(),
        })
        .expect_err("invalid");
        assert!(matches!(err, DomainError::InvalidTimestamp { .. }));
        assert_eq!(
            err.to_string(),
            "Given invalid timestamp: 9999-01-01T00:00:00Z, can not be in the future."
        );
    }

    #[tokio::test]
    async fn in_memory_find_pages_in_recording_order() {
        let repo = InMemoryTestimonyRepository::new();
        for (id, timestamp) in [
            ("a", datetime!(2006-01-01 00:00 UTC)),
            ("b", datetime!(2004-01-01 00:00 UTC)),
            ("c", datetime!(2005-01-01 00:00 UTC)),
        ] {
            repo.create(&testimony(id, "w-1", timestamp))
                .await
                .expect("create");
        }

        let filter = TestimonyFilter::default();
        let page = Page { skip: 1, limit: 1 };
        let recorded = repo
            .find(&filter, page, TestimonySort::Recorded)
            .await
            .expect("find");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].id, "b");

        let by_time = repo
            .find(&filter, Page { skip: 0, limit: 10 }, TestimonySort::Timestamp)
            .await
            .expect("find");
        let ids: Vec<_> = by_time.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert_eq!(repo.count(&filter).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn in_memory_rejects_duplicate_ids() {
        let repo = InMemoryTestimonyRepository::new();
        let item = testimony("a", "w-1", datetime!(2004-01-01 00:00 UTC));
        repo.create(&item).await.expect("first insert");
        assert!(matches!(
            repo.create(&item).await,
            Err(DomainError::Storage(_))
        ));
        assert_eq!(repo.len().await, 1);
    }

    #[test]
    fn testimony_renders_iso_timestamp_without_internal_fields() {
        let item = testimony("a", "w-1", datetime!(2004-01-01 00:00 UTC));
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "id": "a",
                "witnessId": "w-1",
                "executionFactId": "e32db94c-f2ca-4804-a7d8-90d35f65b57b",
                "timestamp": "2004-01-01T00:00:00Z",
            })
        );
    }
}

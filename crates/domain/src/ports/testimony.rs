use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::testimony::{Page, Testimony, TestimonyFilter, TestimonySort};

/// Append-only testimony storage.
///
/// `find` must return rows in the order selected by `sort`, with recording
/// order (`recorded_at_ms`, then `id`) breaking any tie, so `skip`/`limit`
/// address the same slice across repeated calls.
pub trait TestimonyRepository: Send + Sync {
    fn create(&self, testimony: &Testimony) -> BoxFuture<'_, DomainResult<Testimony>>;

    fn count(&self, filter: &TestimonyFilter) -> BoxFuture<'_, DomainResult<u64>>;

    fn find(
        &self,
        filter: &TestimonyFilter,
        page: Page,
        sort: TestimonySort,
    ) -> BoxFuture<'_, DomainResult<Vec<Testimony>>>;
}

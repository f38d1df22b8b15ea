pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::test::TestDefinition;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryTestCatalog;
pub use postgres::PgTestCatalog;

/// Boundary to the test catalog. The lifecycle only ever reads snapshots;
/// the admin surface adds definitions. Full catalog CRUD lives outside this
/// service.
#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn insert_test(&self, test: TestDefinition) -> Result<TestDefinition>;

    /// Definition as it stands right now; callers freeze it into the attempt.
    async fn test_snapshot(&self, id: Uuid) -> Result<Option<TestDefinition>>;

    async fn list_tests(&self) -> Result<Vec<TestDefinition>>;
}

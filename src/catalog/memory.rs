use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::test::TestDefinition;

use super::TestCatalog;

#[derive(Default)]
pub struct MemoryTestCatalog {
    tests: Mutex<HashMap<Uuid, TestDefinition>>,
}

impl MemoryTestCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestCatalog for MemoryTestCatalog {
    async fn insert_test(&self, test: TestDefinition) -> Result<TestDefinition> {
        let mut tests = self.tests.lock().expect("test catalog mutex poisoned");
        tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn test_snapshot(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        let tests = self.tests.lock().expect("test catalog mutex poisoned");
        Ok(tests.get(&id).cloned())
    }

    async fn list_tests(&self) -> Result<Vec<TestDefinition>> {
        let tests = self.tests.lock().expect("test catalog mutex poisoned");
        let mut all: Vec<TestDefinition> = tests.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

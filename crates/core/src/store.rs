//! 상태 저장소 trait: 엔진 상태 체크포인트를 위한 주입 지점
//!
//! 영속화 자체는 이 크레이트의 범위가 아닙니다. 외부에서 [`StateStore`]
//! 구현체를 주입하며, 테스트와 단일 프로세스 실행을 위해
//! [`MemoryStateStore`]를 제공합니다.

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StorageError;

/// 키-값 상태 저장소
///
/// `Send + Sync + 'static` 바운드로 태스크 간 공유가 가능합니다.
pub trait StateStore: Send + Sync + 'static {
    /// 키에 해당하는 값을 조회합니다.
    fn get(&self, key: &str)
    -> impl Future<Output = Result<Option<Value>, StorageError>> + Send;

    /// 값을 저장합니다. 기존 값은 덮어씁니다.
    fn put(&self, key: &str, value: Value)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// 값을 삭제합니다. 삭제된 값이 있었으면 `true`입니다.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// 인메모리 상태 저장소
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStateStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 항목 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 저장소가 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        store.put("watermark", json!(42)).await.unwrap();
        assert_eq!(store.get("watermark").await.unwrap(), Some(json!(42)));
        assert_eq!(store.len().await, 1);

        assert!(store.delete("watermark").await.unwrap());
        assert!(!store.delete("watermark").await.unwrap());
        assert_eq!(store.get("watermark").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryStateStore::new();
        store.put("k", json!("a")).await.unwrap();
        store.put("k", json!("b")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!("b")));
    }
}

//! 스트림-테이블 보강
//!
//! 메모리 테이블의 행을 조인 키로 색인하고 이벤트마다 조회합니다.
//! inner 조인 의미만 지원하며 매칭되지 않는 이벤트는 결과에서 빠집니다.
//! 시간 제약은 없습니다.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use tideway_core::event::{StreamEvent, lookup_path, value_to_key};

/// 테이블 행이 붙은 이벤트
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEvent {
    /// 원본 이벤트
    pub event: StreamEvent,
    /// 매칭된 테이블 행
    pub row: Value,
    /// 조인 키
    pub join_key: String,
}

/// 이벤트를 테이블 행으로 보강합니다.
///
/// `stream_key`는 이벤트 필드 경로, `table_key`는 행 내부 경로입니다.
/// 같은 키를 가진 행이 여러 개면 마지막 행이 사용됩니다.
pub fn enrich_stream(
    events: &[StreamEvent],
    table: &[Value],
    stream_key: &str,
    table_key: &str,
) -> Vec<EnrichedEvent> {
    let index: HashMap<String, &Value> = table
        .iter()
        .filter_map(|row| {
            lookup_path(row, table_key)
                .and_then(value_to_key)
                .map(|key| (key, row))
        })
        .collect();

    let enriched: Vec<EnrichedEvent> = events
        .iter()
        .filter_map(|event| {
            let key = event.key_of(stream_key)?;
            let row = index.get(&key)?;
            Some(EnrichedEvent {
                event: event.clone(),
                row: (*row).clone(),
                join_key: key,
            })
        })
        .collect();

    debug!(
        events = events.len(),
        rows = index.len(),
        enriched = enriched.len(),
        "stream enriched"
    );
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<Value> {
        vec![
            json!({"id": "u1", "name": "Alice", "tier": "gold"}),
            json!({"id": "u2", "name": "Bob", "tier": "silver"}),
            json!({"name": "no id"}),
        ]
    }

    #[test]
    fn matches_rows_by_key() {
        let events = vec![
            StreamEvent::new("o1", json!({"user": "u2", "amount": 10}), 0),
            StreamEvent::new("o2", json!({"user": "u1", "amount": 20}), 1),
        ];
        let out = enrich_stream(&events, &users(), "user", "id");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].row["name"], "Bob");
        assert_eq!(out[1].join_key, "u1");
        assert_eq!(out[1].event.key, "o2");
    }

    #[test]
    fn unmatched_events_are_dropped() {
        let events = vec![
            StreamEvent::new("o1", json!({"user": "u9"}), 0),
            StreamEvent::new("o2", json!({}), 0),
        ];
        assert!(enrich_stream(&events, &users(), "user", "id").is_empty());
    }

    #[test]
    fn numeric_keys_and_nested_paths() {
        let table = vec![json!({"meta": {"code": 7}, "label": "seven"})];
        let events = vec![StreamEvent::new("e", json!({"code": 7}), 0)];
        let out = enrich_stream(&events, &table, "code", "meta.code");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row["label"], "seven");
    }

    #[test]
    fn last_duplicate_row_wins() {
        let table = vec![json!({"id": 1, "v": "old"}), json!({"id": 1, "v": "new"})];
        let events = vec![StreamEvent::new("e", json!({"id": 1}), 0)];
        let out = enrich_stream(&events, &table, "id", "id");
        assert_eq!(out[0].row["v"], "new");
    }

    #[test]
    fn metadata_as_stream_key() {
        let event = StreamEvent::new("e", json!({}), 0).with_metadata("user", json!("u1"));
        let out = enrich_stream(&[event], &users(), "metadata.user", "id");
        assert_eq!(out[0].row["tier"], "gold");
    }
}

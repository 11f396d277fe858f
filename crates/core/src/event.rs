//! 스트림 이벤트: 모든 컴포넌트가 주고받는 기본 단위
//!
//! [`StreamEvent`]는 커넥터가 전달하고 CEP 엔진, 프로세서, 조인이 소비하는
//! 불변 이벤트입니다. 페이로드는 구조화된 JSON 값이며,
//! 필드 경로(`value.amount`, `metadata.region` 등)로 값을 조회합니다.
//!
//! # 필드 경로 규칙
//! - `id`, `key`, `timestamp`: 이벤트 자체 필드
//! - `value`: 페이로드 전체, `value.<path>`: 페이로드 내부
//! - `metadata.<key>[.<path>]`: 메타데이터
//! - 그 외 `<path>`: 페이로드 내부 경로로 해석

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// 스트림 이벤트
///
/// 수집 이후에는 변경되지 않습니다. 도착 순서는 보장되지 않으므로
/// 시간 기반 로직은 항상 `timestamp`(밀리초)를 기준으로 동작합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// 이벤트 고유 ID (UUID v4). 매칭 중복 제거에 사용
    #[serde(default = "new_event_id")]
    pub id: String,
    /// 이벤트 키 (파티션/조인 키로 주로 사용)
    pub key: String,
    /// 구조화된 페이로드
    pub value: Value,
    /// 이벤트 시각 (Unix epoch 밀리초)
    pub timestamp: i64,
    /// 부가 메타데이터
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl StreamEvent {
    /// 새 이벤트를 생성합니다. ID는 자동으로 발급됩니다.
    pub fn new(key: impl Into<String>, value: Value, timestamp: i64) -> Self {
        Self {
            id: new_event_id(),
            key: key.into(),
            value,
            timestamp,
            metadata: BTreeMap::new(),
        }
    }

    /// 메타데이터 항목을 추가합니다.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 필드 경로로 값을 조회합니다.
    ///
    /// `key`, `timestamp`, `id`는 소유 값으로, 페이로드/메타데이터 값은
    /// 참조로 반환합니다. 경로가 없으면 `None`을 반환합니다.
    pub fn field(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "id" => return Some(Cow::Owned(Value::String(self.id.clone()))),
            "key" => return Some(Cow::Owned(Value::String(self.key.clone()))),
            "timestamp" => return Some(Cow::Owned(Value::from(self.timestamp))),
            "value" => return Some(Cow::Borrowed(&self.value)),
            _ => {}
        }

        if let Some(rest) = path.strip_prefix("metadata.") {
            let (head, tail) = match rest.split_once('.') {
                Some((head, tail)) => (head, Some(tail)),
                None => (rest, None),
            };
            let root = self.metadata.get(head)?;
            return match tail {
                Some(tail) => lookup_path(root, tail).map(Cow::Borrowed),
                None => Some(Cow::Borrowed(root)),
            };
        }

        let inner = path.strip_prefix("value.").unwrap_or(path);
        lookup_path(&self.value, inner).map(Cow::Borrowed)
    }

    /// 필드 값을 숫자로 조회합니다. 숫자가 아니면 `None`입니다.
    pub fn numeric_field(&self, path: &str) -> Option<f64> {
        self.field(path).and_then(|v| v.as_f64())
    }

    /// 여러 필드 값을 묶어 문자열화된 튜플 키를 만듭니다.
    ///
    /// 없는 필드는 `null`로 채워집니다. 예: `["u-1","login"]`
    pub fn group_key<S: AsRef<str>>(&self, fields: &[S]) -> String {
        let tuple: Vec<Value> = fields
            .iter()
            .map(|f| {
                self.field(f.as_ref())
                    .map(Cow::into_owned)
                    .unwrap_or(Value::Null)
            })
            .collect();
        Value::Array(tuple).to_string()
    }

    /// 단일 필드 값을 키 문자열로 변환합니다 (조인 키 추출용).
    pub fn key_of(&self, path: &str) -> Option<String> {
        self.field(path).and_then(|v| value_to_key(&v))
    }

    /// JSON 바이트로 인코딩합니다.
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// JSON 바이트에서 디코딩합니다.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(raw).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamEvent[{}] key={} ts={}",
            &self.id[..8.min(self.id.len())],
            self.key,
            self.timestamp,
        )
    }
}

/// 점(`.`)으로 구분된 경로를 따라 JSON 값을 탐색합니다.
///
/// 배열에서는 숫자 세그먼트를 인덱스로 해석합니다.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// 스칼라 JSON 값을 키 문자열로 변환합니다.
///
/// 문자열은 따옴표 없이, 숫자/불리언은 그대로 문자열화합니다.
/// `null`은 키로 사용할 수 없으므로 `None`입니다.
pub fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> StreamEvent {
        StreamEvent::new(
            "user-42",
            json!({"amount": 120.5, "user": {"id": "u-1", "tags": ["a", "b"]}}),
            1_700_000_000_000,
        )
        .with_metadata("region", "eu-west-1")
    }

    #[test]
    fn new_event_has_uuid() {
        let event = sample_event();
        assert_eq!(event.id.len(), 36);
        assert_eq!(event.id.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn field_resolves_builtin_fields() {
        let event = sample_event();
        assert_eq!(event.field("key").unwrap().as_str(), Some("user-42"));
        assert_eq!(
            event.field("timestamp").unwrap().as_i64(),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn field_resolves_value_paths_with_and_without_prefix() {
        let event = sample_event();
        assert_eq!(event.numeric_field("amount"), Some(120.5));
        assert_eq!(event.numeric_field("value.amount"), Some(120.5));
        assert_eq!(event.field("user.id").unwrap().as_str(), Some("u-1"));
        assert_eq!(event.field("user.tags.1").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn field_resolves_metadata() {
        let event = sample_event();
        assert_eq!(
            event.field("metadata.region").unwrap().as_str(),
            Some("eu-west-1")
        );
        assert!(event.field("metadata.zone").is_none());
    }

    #[test]
    fn missing_field_is_none() {
        let event = sample_event();
        assert!(event.field("user.missing").is_none());
        assert!(event.numeric_field("user.id").is_none());
    }

    #[test]
    fn group_key_fills_missing_with_null() {
        let event = sample_event();
        assert_eq!(event.group_key(&["user.id", "nope"]), r#"["u-1",null]"#);
    }

    #[test]
    fn key_of_strips_string_quotes() {
        let event = sample_event();
        assert_eq!(event.key_of("user.id").as_deref(), Some("u-1"));
        assert_eq!(event.key_of("amount").as_deref(), Some("120.5"));
        assert!(event.key_of("missing").is_none());
    }

    #[test]
    fn bytes_roundtrip_preserves_event() {
        let event = sample_event();
        let raw = event.to_bytes().unwrap();
        let decoded = StreamEvent::from_bytes(&raw).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_assigns_id_when_missing() {
        let raw = br#"{"key":"k","value":1,"timestamp":5}"#;
        let decoded = StreamEvent::from_bytes(raw).unwrap();
        assert!(!decoded.id.is_empty());
        assert!(decoded.metadata.is_empty());
    }

    #[test]
    fn decode_invalid_json_fails() {
        let err = StreamEvent::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn display_contains_key_and_timestamp() {
        let display = sample_event().to_string();
        assert!(display.contains("user-42"));
        assert!(display.contains("1700000000000"));
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<StreamEvent>();
    }
}

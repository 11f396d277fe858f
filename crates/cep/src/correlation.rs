//! 이벤트 상관 분석 -- 필드 튜플 기준 그룹화

use std::collections::BTreeMap;

use tideway_core::event::StreamEvent;

/// 키 필드 값의 튜플로 이벤트를 그룹화합니다.
///
/// 그룹 키는 필드 값의 JSON 배열 문자열이며, 없는 필드는 `null`로 표기됩니다.
/// 그룹 내부는 입력 순서를 유지합니다.
pub fn correlate_events<S: AsRef<str>>(
    events: &[StreamEvent],
    keys: &[S],
) -> BTreeMap<String, Vec<StreamEvent>> {
    let mut groups: BTreeMap<String, Vec<StreamEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.group_key(keys))
            .or_default()
            .push(event.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn groups_by_field_tuple() {
        let events = vec![
            StreamEvent::new("a", json!({"user": "u1", "ip": "10.0.0.1"}), 1),
            StreamEvent::new("b", json!({"user": "u2", "ip": "10.0.0.1"}), 2),
            StreamEvent::new("c", json!({"user": "u1", "ip": "10.0.0.1"}), 3),
        ];
        let groups = correlate_events(&events, &["user", "ip"]);
        assert_eq!(groups.len(), 2);
        let u1 = groups.values().find(|g| g.len() == 2).unwrap();
        assert_eq!(u1[0].key, "a");
        assert_eq!(u1[1].key, "c");
    }

    #[test]
    fn missing_fields_group_together() {
        let events = vec![
            StreamEvent::new("a", json!({}), 1),
            StreamEvent::new("b", json!({"other": 1}), 2),
        ];
        let groups = correlate_events(&events, &["user"]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn empty_input() {
        assert!(correlate_events(&[], &["user"]).is_empty());
    }
}

//! 통합 테스트 -- 패턴 등록부터 알림 수신까지 엔진 전체 흐름 검증

use proptest::prelude::*;
use serde_json::json;

use tideway_cep::{
    AnomalyConfig, AnomalyMethod, CepEngine, CepNotification, CepPattern, Condition,
    EngineConfig, PatternBuilder, PatternType, Quantifier,
};
use tideway_core::config::TidewayConfig;
use tideway_core::event::StreamEvent;

fn event(kind: &str, user: &str, ts: i64) -> StreamEvent {
    StreamEvent::new(user, json!({"type": kind, "user": user}), ts)
}

fn login_then_transfer(within: u64) -> CepPattern {
    PatternBuilder::sequence("login-then-transfer")
        .condition(Condition::eq("type", "login"))
        .condition(Condition::eq("type", "transfer"))
        .within(within)
        .build()
        .expect("valid pattern")
}

/// core 설정에서 엔진 생성
#[test]
fn engine_from_core_config() {
    let core = TidewayConfig::default();
    let engine = CepEngine::new(EngineConfig::from_core(&core.cep)).expect("engine");
    assert_eq!(engine.config().max_buffer_size, core.cep.max_buffer_size);
}

/// sequence: 100ms 안에 A 다음 B
#[test]
fn sequence_match_inside_window() {
    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine.register_pattern(login_then_transfer(100)).unwrap();

    let found = engine
        .process_events(vec![event("login", "u1", 0), event("transfer", "u1", 5)])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].pattern_type, PatternType::Sequence);
    assert_eq!(found[0].events[0].value["type"], "login");
    assert_eq!(found[0].events[1].value["type"], "transfer");
}

/// sequence: 시간 제약 초과
#[test]
fn sequence_no_match_outside_window() {
    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine.register_pattern(login_then_transfer(100)).unwrap();

    let found = engine
        .process_events(vec![event("login", "u1", 0), event("transfer", "u1", 150)])
        .unwrap();
    assert!(found.is_empty());
}

/// negation: 주문 후 결제 없음
#[test]
fn negation_order_without_payment() {
    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine
        .register_pattern(
            PatternBuilder::negation("unpaid-order")
                .condition(Condition::eq("type", "order"))
                .absent(Condition::eq("type", "payment"))
                .within(1_000)
                .build()
                .unwrap(),
        )
        .unwrap();

    let found = engine
        .process_events(vec![
            event("order", "u1", 0),
            event("payment", "u1", 500),
            event("order", "u2", 2_000),
        ])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].events[0].key, "u2");
}

/// 여러 패턴이 동시에 평가되고 알림이 순서대로 전달됨
#[tokio::test]
async fn multiple_patterns_notify() {
    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine.register_pattern(login_then_transfer(1_000)).unwrap();
    engine
        .register_pattern(
            PatternBuilder::iteration("failed-burst")
                .condition(Condition::eq("type", "failed"))
                .quantifier(Quantifier::exactly(3))
                .within(1_000)
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut rx = engine.subscribe();

    let batch = vec![
        event("failed", "u1", 0),
        event("failed", "u1", 10),
        event("failed", "u1", 20),
        event("login", "u1", 30),
        event("transfer", "u1", 40),
    ];
    let found = engine.process_events(batch).unwrap();
    assert_eq!(found.len(), 2);

    let mut ids = Vec::new();
    for _ in 0..2 {
        match rx.recv().await.unwrap() {
            CepNotification::PatternMatch(m) => ids.push(m.pattern_id),
            other => panic!("unexpected: {other:?}"),
        }
    }
    ids.sort();
    assert_eq!(ids, vec!["failed-burst", "login-then-transfer"]);
}

/// JSON으로 정의한 패턴 등록
#[test]
fn pattern_from_json_definition() {
    let pattern: CepPattern = serde_json::from_value(json!({
        "id": "admin-access",
        "pattern_type": "disjunction",
        "conditions": [
            {"field": "path", "operator": "regex", "value": "^/admin"},
            {"field": "role", "operator": "eq", "value": "root"}
        ],
        "time_constraint": {"within_ms": 1000}
    }))
    .unwrap();

    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine.register_pattern(pattern).unwrap();
    let found = engine
        .process_events(vec![StreamEvent::new("req", json!({"path": "/admin/users"}), 0)])
        .unwrap();
    assert_eq!(found.len(), 1);
}

/// 이상 탐지 후 상관 분석
#[test]
fn anomaly_then_correlate() {
    let engine = CepEngine::new(EngineConfig::default()).unwrap();
    let mut events: Vec<StreamEvent> = (0..30)
        .map(|i| {
            let host = if i % 2 == 0 { "h1" } else { "h2" };
            StreamEvent::new(host, json!({"latency": 20, "host": host}), i)
        })
        .collect();
    events[12] = StreamEvent::new("h1", json!({"latency": 900, "host": "h1"}), 12);

    let anomalies = engine
        .detect_anomalies(&events, &AnomalyConfig::new(AnomalyMethod::ZScore, "latency"))
        .unwrap();
    assert_eq!(anomalies.len(), 1);

    let groups = engine.correlate_events(&events, &["host"]);
    assert_eq!(groups.len(), 2);
    assert!(groups.values().all(|g| g.len() == 15));
}

proptest! {
    /// 버퍼는 용량을 넘지 않고 가장 최근 이벤트만 유지
    #[test]
    fn buffer_is_bounded(capacity in 1usize..50, count in 0usize..200) {
        let config = EngineConfig::default().with_max_buffer_size(capacity);
        let mut engine = CepEngine::new(config).unwrap();
        engine
            .process_events((0..count).map(|i| event("x", "u", i as i64)))
            .unwrap();
        prop_assert_eq!(engine.buffer_len(), count.min(capacity));
        prop_assert_eq!(engine.dropped_count(), count.saturating_sub(capacity) as u64);
    }

    /// 같은 매칭은 이후 호출에서 다시 보고되지 않음
    #[test]
    fn matches_are_not_repeated(gap in 0i64..100, extra in 0usize..5) {
        let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
        engine.register_pattern(login_then_transfer(100)).unwrap();
        let first = engine
            .process_events(vec![event("login", "u", 0), event("transfer", "u", gap)])
            .unwrap();
        prop_assert_eq!(first.len(), 1);
        for i in 0..extra {
            let again = engine
                .process_events(vec![event("noise", "u", 200 + i as i64)])
                .unwrap();
            prop_assert!(again.is_empty());
        }
    }
}

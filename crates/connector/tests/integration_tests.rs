//! 통합 테스트 -- 커넥터에서 CEP 엔진까지 이어지는 흐름과 재연결 동작 검증

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;

use tideway_connector::{
    ConnectionState, Connector, ConnectorError, ConnectorNotification, ConnectorSettings,
    Platform, memory_channel,
};
use tideway_core::config::TidewayConfig;
use tideway_core::error::TidewayError;
use tideway_core::event::StreamEvent;

fn settings(base_ms: u64, max_attempts: u32) -> ConnectorSettings {
    ConnectorSettings::default()
        .with_platform(Platform::RedisStreams)
        .with_reconnect(Duration::from_millis(base_ms), max_attempts)
}

/// core 설정의 [connector] 섹션에서 생성
#[test]
fn settings_from_core_config() {
    let mut core = TidewayConfig::default();
    core.connector.platform = "pulsar".to_owned();
    core.connector.max_reconnect_attempts = 3;
    let settings = ConnectorSettings::from_core(&core.connector).unwrap();
    assert_eq!(settings.connection.platform, Platform::Pulsar);
    assert_eq!(settings.max_reconnect_attempts, 3);
}

/// 알 수 없는 플랫폼은 TidewayError::Connector
#[test]
fn unknown_platform_propagates() {
    fn load(name: &str) -> Result<ConnectorSettings, TidewayError> {
        let mut core = TidewayConfig::default().connector;
        core.platform = name.to_owned();
        Ok(ConnectorSettings::from_core(&core)?)
    }
    assert!(matches!(load("mqtt"), Err(TidewayError::Connector(_))));
}

/// N번 연속 실패 시 min(N, max)번 재연결
#[tokio::test(start_paused = true)]
async fn reconnect_attempt_count_matches_failures() {
    for failures in [1u32, 4, 10, 11, 15] {
        let (factory, _endpoint) = memory_channel(4);
        factory.fail_next_connects(failures);
        let mut connector = Connector::new(settings(10, 10), factory);
        let mut rx = connector.subscribe();

        let result = connector.connect().await;
        let mut reconnects = Vec::new();
        let mut gave_up = false;
        while let Ok(note) = rx.try_recv() {
            match note {
                ConnectorNotification::Reconnecting { delay, .. } => reconnects.push(delay),
                ConnectorNotification::MaxReconnectAttempts { .. } => gave_up = true,
                _ => {}
            }
        }

        assert_eq!(reconnects.len() as u32, failures.min(10), "failures = {failures}");
        for pair in reconnects.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
        assert_eq!(gave_up, failures > 10);
        assert_eq!(result.is_ok(), failures <= 10);
    }
}

/// 한도 초과 후 새 connect 호출은 처음부터 다시 시도
#[tokio::test(start_paused = true)]
async fn fresh_connect_after_exhaustion() {
    let (factory, _endpoint) = memory_channel(4);
    factory.fail_next_connects(3);
    let mut connector = Connector::new(settings(10, 1), factory);

    assert!(matches!(
        connector.connect().await,
        Err(ConnectorError::MaxReconnectAttempts { attempts: 1 })
    ));
    assert_eq!(connector.state(), ConnectionState::Disconnected);

    // 남은 실패 1회 후 재연결 1회로 성공
    connector.connect().await.unwrap();
    assert!(connector.is_connected());
}

/// 재연결 시 처리량 카운터 초기화
#[tokio::test(start_paused = true)]
async fn counters_reset_on_reconnect() {
    let (factory, mut endpoint) = memory_channel(8);
    let mut connector = Connector::new(settings(10, 3), factory);
    connector.connect().await.unwrap();

    connector
        .produce(&StreamEvent::new("k", json!({}), 0))
        .await
        .unwrap();
    assert!(endpoint.recv().await.is_some());
    assert_eq!(connector.metrics().records_out, 1);

    connector.disconnect().await.unwrap();
    connector.connect().await.unwrap();
    assert_eq!(connector.metrics().records_out, 0);
}

/// 커넥터에서 받은 이벤트를 CEP 엔진으로 전달
#[tokio::test(start_paused = true)]
async fn feeds_cep_engine_one_event_at_a_time() {
    use tideway_cep::{CepEngine, Condition, EngineConfig, PatternBuilder};

    let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
    engine
        .register_pattern(
            PatternBuilder::sequence("login-then-transfer")
                .condition(Condition::eq("type", "login"))
                .condition(Condition::eq("type", "transfer"))
                .within(1_000)
                .build()
                .unwrap(),
        )
        .unwrap();
    let engine = Arc::new(Mutex::new(engine));

    let (factory, mut endpoint) = memory_channel(8);
    let mut connector = Connector::new(settings(10, 3), factory);
    connector.connect().await.unwrap();

    endpoint
        .send_event(&StreamEvent::new("u1", json!({"type": "login"}), 0))
        .await
        .unwrap();
    endpoint
        .send_event(&StreamEvent::new("u1", json!({"type": "transfer"}), 100))
        .await
        .unwrap();
    endpoint.finish();

    let matches = Arc::new(Mutex::new(0usize));
    let (handler_engine, handler_matches) = (Arc::clone(&engine), Arc::clone(&matches));
    let delivered = connector
        .consume(move |event| {
            let engine = Arc::clone(&handler_engine);
            let matches = Arc::clone(&handler_matches);
            async move {
                let found = engine.lock().await.process_events([event])?;
                *matches.lock().await += found.len();
                Ok::<_, tideway_cep::CepError>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(*matches.lock().await, 1);
}

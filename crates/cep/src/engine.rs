//! CEP 엔진 -- 패턴 레지스트리, 버퍼, 탐지 코디네이터
//!
//! [`CepEngine`]은 배치가 들어올 때마다 이벤트를 버퍼에 추가하고,
//! 버퍼 전체를 타임스탬프 순으로 정렬한 뷰에 대해 모든 패턴을 재평가합니다.
//! 같은 패턴과 같은 이벤트 집합의 매칭은 한 번만 보고됩니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut engine = CepEngine::new(EngineConfig::default())?;
//! engine.register_pattern(
//!     PatternBuilder::sequence("login-then-transfer")
//!         .condition(Condition::eq("type", "login"))
//!         .condition(Condition::eq("type", "transfer"))
//!         .within(5_000)
//!         .build()?,
//! )?;
//!
//! let mut rx = engine.subscribe();
//! let matches = engine.process_events(batch)?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use tideway_core::event::StreamEvent;
use tideway_core::metrics as m;
use tideway_core::notify::Notifier;

use crate::anomaly::{Anomaly, AnomalyConfig, AnomalyDefaults, detect_anomalies};
use crate::buffer::EventBuffer;
use crate::config::EngineConfig;
use crate::correlation::correlate_events;
use crate::detect::Detector;
use crate::error::CepError;
use crate::pattern::{CepPattern, ConditionMatcher, PatternType};

/// 패턴 매칭 결과
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    /// 매칭 고유 ID
    pub id: String,
    /// 매칭된 패턴 ID
    pub pattern_id: String,
    /// 패턴 유형
    pub pattern_type: PatternType,
    /// 매칭에 참여한 이벤트 (타임스탬프 순)
    pub events: Vec<StreamEvent>,
    /// 가장 이른 이벤트 타임스탬프
    pub start_time: i64,
    /// 가장 늦은 이벤트 타임스탬프
    pub end_time: i64,
    /// `end_time - start_time`
    pub duration_ms: i64,
    /// 탐지 시각
    pub detected_at: SystemTime,
}

/// CEP 엔진 알림
#[derive(Debug, Clone)]
pub enum CepNotification {
    /// 패턴 등록 (패턴 ID)
    PatternRegistered(String),
    /// 패턴 등록 해제 (패턴 ID)
    PatternUnregistered(String),
    /// 새 패턴 매칭
    PatternMatch(PatternMatch),
    /// 이상 탐지
    AnomalyDetected(Anomaly),
}

/// CEP 엔진
pub struct CepEngine {
    config: EngineConfig,
    /// 등록된 패턴 (ID -> 패턴)
    patterns: BTreeMap<String, CepPattern>,
    matcher: ConditionMatcher,
    buffer: EventBuffer,
    /// 이미 보고된 매칭 시그니처 -> 참여 이벤트 ID
    seen: BTreeMap<String, Vec<String>>,
    /// 누적 매칭 로그
    match_log: Vec<PatternMatch>,
    notifier: Notifier<CepNotification>,
}

impl CepEngine {
    /// 새 엔진을 생성합니다.
    pub fn new(config: EngineConfig) -> Result<Self, CepError> {
        config.validate()?;
        Ok(Self {
            buffer: EventBuffer::new(config.max_buffer_size),
            notifier: Notifier::new(config.notify_capacity),
            config,
            patterns: BTreeMap::new(),
            matcher: ConditionMatcher::new(),
            seen: BTreeMap::new(),
            match_log: Vec::new(),
        })
    }

    /// 패턴을 등록합니다. 같은 ID의 패턴은 교체됩니다.
    pub fn register_pattern(&mut self, pattern: CepPattern) -> Result<(), CepError> {
        pattern.validate()?;
        self.matcher.compile_pattern(&pattern)?;

        info!(
            pattern_id = %pattern.id,
            pattern_type = %pattern.pattern_type,
            conditions = pattern.conditions.len(),
            "pattern registered"
        );
        let id = pattern.id.clone();
        if self.patterns.insert(id.clone(), pattern).is_some() {
            debug!("replaced existing pattern");
        }
        metrics::gauge!(m::CEP_PATTERNS_REGISTERED).set(self.patterns.len() as f64);
        self.notifier.emit(CepNotification::PatternRegistered(id));
        Ok(())
    }

    /// 패턴 등록을 해제합니다.
    pub fn unregister_pattern(&mut self, pattern_id: &str) -> Option<CepPattern> {
        let removed = self.patterns.remove(pattern_id)?;
        self.matcher.remove_pattern(pattern_id);
        metrics::gauge!(m::CEP_PATTERNS_REGISTERED).set(self.patterns.len() as f64);
        info!(pattern_id, "pattern unregistered");
        self.notifier
            .emit(CepNotification::PatternUnregistered(pattern_id.to_owned()));
        Some(removed)
    }

    /// 배치를 처리하고 이번 호출에서 새로 발견된 매칭을 반환합니다.
    pub fn process_events(
        &mut self,
        events: impl IntoIterator<Item = StreamEvent>,
    ) -> Result<Vec<PatternMatch>, CepError> {
        let mut ingested = 0u64;
        let mut dropped = 0u64;
        for event in events {
            ingested += 1;
            if self.buffer.push(event) {
                dropped += 1;
            }
        }
        metrics::counter!(m::CEP_EVENTS_PROCESSED_TOTAL).increment(ingested);
        if dropped > 0 {
            metrics::counter!(m::CEP_EVENTS_DROPPED_TOTAL).increment(dropped);
        }
        metrics::gauge!(m::CEP_BUFFER_SIZE).set(self.buffer.len() as f64);

        let mut view: Vec<&StreamEvent> = self.buffer.iter().collect();
        view.sort_by_key(|e| e.timestamp);

        let detector = Detector::new(&self.matcher, self.config.default_within_ms);
        let mut fresh = Vec::new();

        for pattern in self.patterns.values() {
            for candidate in detector.detect(pattern, &view)? {
                let ids: Vec<String> = candidate.iter().map(|e| e.id.clone()).collect();
                let signature = format!("{}|{}", pattern.id, ids.join(","));
                if self.seen.contains_key(&signature) {
                    continue;
                }
                self.seen.insert(signature, ids);

                let start_time = candidate.iter().map(|e| e.timestamp).min().unwrap_or(0);
                let end_time = candidate.iter().map(|e| e.timestamp).max().unwrap_or(0);
                fresh.push(PatternMatch {
                    id: uuid::Uuid::new_v4().to_string(),
                    pattern_id: pattern.id.clone(),
                    pattern_type: pattern.pattern_type,
                    events: candidate.into_iter().cloned().collect(),
                    start_time,
                    end_time,
                    duration_ms: end_time - start_time,
                    detected_at: SystemTime::now(),
                });
            }
        }

        // 버퍼에서 빠진 이벤트가 포함된 시그니처는 다시 나타날 수 없음
        let live: HashSet<&str> = self.buffer.iter().map(|e| e.id.as_str()).collect();
        self.seen
            .retain(|_, ids| ids.iter().all(|id| live.contains(id.as_str())));

        for found in &fresh {
            metrics::counter!(
                m::CEP_PATTERN_MATCHES_TOTAL,
                m::LABEL_PATTERN_TYPE => found.pattern_type.as_str()
            )
            .increment(1);
            debug!(
                pattern_id = %found.pattern_id,
                events = found.events.len(),
                duration_ms = found.duration_ms,
                "pattern matched"
            );
            self.notifier
                .emit(CepNotification::PatternMatch(found.clone()));
        }
        self.match_log.extend(fresh.iter().cloned());

        Ok(fresh)
    }

    /// 배치에서 이상을 탐지하고 알림을 발행합니다.
    pub fn detect_anomalies(
        &self,
        events: &[StreamEvent],
        config: &AnomalyConfig,
    ) -> Result<Vec<Anomaly>, CepError> {
        let defaults = AnomalyDefaults {
            zscore_threshold: self.config.zscore_threshold,
            outlier_sensitivity: self.config.outlier_sensitivity,
            window_size: self.config.anomaly_window_size,
        };
        let anomalies = detect_anomalies(events, config, &defaults)?;

        if !anomalies.is_empty() {
            metrics::counter!(m::CEP_ANOMALIES_TOTAL, m::LABEL_METHOD => config.method.as_str())
                .increment(anomalies.len() as u64);
            info!(
                method = %config.method,
                field = %config.field,
                count = anomalies.len(),
                "anomalies detected"
            );
        }
        for anomaly in &anomalies {
            self.notifier
                .emit(CepNotification::AnomalyDetected(anomaly.clone()));
        }
        Ok(anomalies)
    }

    /// 키 필드 튜플로 이벤트를 그룹화합니다.
    pub fn correlate_events<S: AsRef<str>>(
        &self,
        events: &[StreamEvent],
        keys: &[S],
    ) -> BTreeMap<String, Vec<StreamEvent>> {
        correlate_events(events, keys)
    }

    /// 알림 구독자를 등록합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<CepNotification> {
        self.notifier.subscribe()
    }

    /// 등록된 패턴 수
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// ID로 패턴을 조회합니다.
    pub fn pattern(&self, pattern_id: &str) -> Option<&CepPattern> {
        self.patterns.get(pattern_id)
    }

    /// 버퍼 내 이벤트 수
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// 버퍼 오버플로우로 제거된 이벤트 수
    pub fn dropped_count(&self) -> u64 {
        self.buffer.dropped_count()
    }

    /// 누적 매칭 로그
    pub fn matches(&self) -> &[PatternMatch] {
        &self.match_log
    }

    /// 누적 매칭 로그를 비웁니다. 중복 제거 상태는 유지됩니다.
    pub fn clear_matches(&mut self) {
        self.match_log.clear();
    }

    /// 버퍼와 중복 제거 상태를 비웁니다.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.seen.clear();
        metrics::gauge!(m::CEP_BUFFER_SIZE).set(0.0);
    }

    /// 엔진 설정
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Condition, PatternBuilder, Quantifier};
    use serde_json::json;

    fn ev(kind: &str, ts: i64) -> StreamEvent {
        StreamEvent::new("user-1", json!({"type": kind}), ts)
    }

    fn engine_with(pattern: CepPattern) -> CepEngine {
        let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
        engine.register_pattern(pattern).unwrap();
        engine
    }

    fn a_then_b() -> CepPattern {
        PatternBuilder::sequence("a-then-b")
            .condition(Condition::eq("type", "A"))
            .condition(Condition::eq("type", "B"))
            .within(100)
            .build()
            .unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let engine = engine_with(a_then_b());
        assert_eq!(engine.pattern_count(), 1);
        assert!(engine.pattern("a-then-b").is_some());
        assert!(engine.pattern("missing").is_none());
    }

    #[test]
    fn register_replaces_same_id() {
        let mut engine = engine_with(a_then_b());
        engine.register_pattern(a_then_b()).unwrap();
        assert_eq!(engine.pattern_count(), 1);
    }

    #[test]
    fn invalid_pattern_not_registered() {
        let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
        let bad = CepPattern {
            id: "bad".to_owned(),
            pattern_type: PatternType::Sequence,
            conditions: vec![Condition::regex("type", "(")],
            time_constraint: None,
            quantifier: None,
        };
        assert!(engine.register_pattern(bad).is_err());
        assert_eq!(engine.pattern_count(), 0);
    }

    #[test]
    fn unregister() {
        let mut engine = engine_with(a_then_b());
        assert!(engine.unregister_pattern("a-then-b").is_some());
        assert!(engine.unregister_pattern("a-then-b").is_none());
        assert_eq!(engine.pattern_count(), 0);
    }

    #[test]
    fn match_spans_batches() {
        let mut engine = engine_with(a_then_b());
        assert!(engine.process_events(vec![ev("A", 0)]).unwrap().is_empty());
        let found = engine.process_events(vec![ev("B", 5)]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start_time, 0);
        assert_eq!(found[0].end_time, 5);
        assert_eq!(found[0].duration_ms, 5);
    }

    #[test]
    fn matches_reported_once() {
        let mut engine = engine_with(a_then_b());
        let first = engine.process_events(vec![ev("A", 0), ev("B", 5)]).unwrap();
        assert_eq!(first.len(), 1);
        let second = engine.process_events(vec![ev("X", 10)]).unwrap();
        assert!(second.is_empty());
        assert_eq!(engine.matches().len(), 1);
    }

    #[test]
    fn clear_matches_keeps_dedup_state() {
        let mut engine = engine_with(a_then_b());
        engine.process_events(vec![ev("A", 0), ev("B", 5)]).unwrap();
        engine.clear_matches();
        assert!(engine.matches().is_empty());
        assert!(engine.process_events(Vec::<StreamEvent>::new()).unwrap().is_empty());
    }

    #[test]
    fn clear_buffer_resets_state() {
        let mut engine = engine_with(a_then_b());
        engine.process_events(vec![ev("A", 0)]).unwrap();
        engine.clear_buffer();
        assert_eq!(engine.buffer_len(), 0);
        assert!(engine.process_events(vec![ev("B", 5)]).unwrap().is_empty());
    }

    #[test]
    fn buffer_overflow_counts_drops() {
        let config = EngineConfig::default().with_max_buffer_size(3);
        let mut engine = CepEngine::new(config).unwrap();
        engine
            .process_events((0..5).map(|i| ev("X", i)))
            .unwrap();
        assert_eq!(engine.buffer_len(), 3);
        assert_eq!(engine.dropped_count(), 2);
    }

    #[test]
    fn evicted_events_cannot_complete_match() {
        let config = EngineConfig::default().with_max_buffer_size(2);
        let mut engine = CepEngine::new(config).unwrap();
        engine.register_pattern(a_then_b()).unwrap();
        engine
            .process_events(vec![ev("A", 0), ev("X", 1), ev("X", 2)])
            .unwrap();
        assert!(engine.process_events(vec![ev("B", 3)]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifies_subscribers() {
        let mut engine = engine_with(a_then_b());
        let mut rx = engine.subscribe();
        engine
            .process_events(vec![ev("A", 0), ev("B", 5)])
            .unwrap();
        match rx.recv().await.unwrap() {
            CepNotification::PatternMatch(m) => assert_eq!(m.pattern_id, "a-then-b"),
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn registry_changes_notify() {
        let mut engine = CepEngine::new(EngineConfig::default()).unwrap();
        let mut rx = engine.subscribe();
        engine.register_pattern(a_then_b()).unwrap();
        engine.unregister_pattern("a-then-b").unwrap();
        assert!(engine.unregister_pattern("a-then-b").is_none());

        assert!(matches!(
            rx.try_recv().unwrap(),
            CepNotification::PatternRegistered(id) if id == "a-then-b"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            CepNotification::PatternUnregistered(id) if id == "a-then-b"
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn iteration_through_engine() {
        let pattern = PatternBuilder::iteration("three-failures")
            .condition(Condition::eq("type", "fail"))
            .quantifier(Quantifier::exactly(3))
            .within(1_000)
            .build()
            .unwrap();
        let mut engine = engine_with(pattern);
        let found = engine
            .process_events((0..3).map(|i| ev("fail", i)))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].events.len(), 3);
    }

    #[test]
    fn anomaly_uses_engine_defaults() {
        let engine = CepEngine::new(EngineConfig::default()).unwrap();
        let mut rx = engine.subscribe();
        let mut events: Vec<_> = (0..20)
            .map(|i| StreamEvent::new("s", json!({"v": 10}), i))
            .collect();
        events[7] = StreamEvent::new("s", json!({"v": 500}), 7);
        let found = engine
            .detect_anomalies(
                &events,
                &AnomalyConfig::new(crate::anomaly::AnomalyMethod::ZScore, "v"),
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context.len(), 8);
        assert!(matches!(
            rx.try_recv().unwrap(),
            CepNotification::AnomalyDetected(_)
        ));
    }

    #[test]
    fn correlate_through_engine() {
        let engine = CepEngine::new(EngineConfig::default()).unwrap();
        let events = vec![ev("A", 0), ev("B", 1), ev("A", 2)];
        let groups = engine.correlate_events(&events, &["type"]);
        assert_eq!(groups.len(), 2);
    }
}

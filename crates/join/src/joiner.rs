//! 스트림-스트림 조인
//!
//! 양쪽 이벤트를 조인 키별로 버퍼링하고, 같은 키를 가지며
//! `|ts_left - ts_right| <= window`인 쌍을 결합합니다.
//!
//! # 방출 규칙
//! - 쌍은 나중에 들어온 쪽이 포함된 호출에서 한 번만 방출됩니다.
//!   이전 호출에서 이미 버퍼에 있던 쌍은 다시 방출하지 않습니다.
//! - outer 조인의 매칭 없는 행은 이번 호출의 새 이벤트에 대해서만 방출됩니다.
//! - 키 필드가 없는 이벤트는 매칭되지 않으며 버퍼에 들어가지 않습니다.
//!
//! # 버퍼 정리
//! 호출이 끝나면 `now - window`보다 오래된 이벤트를 양쪽 버퍼에서 제거합니다.
//! `now`는 이벤트 시간이 아닌 벽시계이며 [`StreamJoiner::with_clock`]으로 교체할 수 있습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use tideway_core::event::StreamEvent;
use tideway_core::metrics as m;

use crate::config::{JoinConfig, StreamJoinerConfig};
use crate::error::JoinError;

/// 현재 시각(밀리초)을 돌려주는 시계
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// 조인 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedEvent {
    /// 왼쪽 이벤트 (right/full 조인의 매칭 없는 행이면 `None`)
    pub left: Option<StreamEvent>,
    /// 오른쪽 이벤트 (left/full 조인의 매칭 없는 행이면 `None`)
    pub right: Option<StreamEvent>,
    /// 조인 키 (키 필드가 없는 이벤트면 `None`)
    pub join_key: Option<String>,
    /// 결과 타임스탬프 (양쪽 중 늦은 쪽)
    pub timestamp: i64,
}

impl JoinedEvent {
    fn pair(key: &str, left: &StreamEvent, right: &StreamEvent) -> Self {
        Self {
            left: Some(left.clone()),
            right: Some(right.clone()),
            join_key: Some(key.to_owned()),
            timestamp: left.timestamp.max(right.timestamp),
        }
    }

    fn left_only(key: Option<&str>, left: &StreamEvent) -> Self {
        Self {
            left: Some(left.clone()),
            right: None,
            join_key: key.map(str::to_owned),
            timestamp: left.timestamp,
        }
    }

    fn right_only(key: Option<&str>, right: &StreamEvent) -> Self {
        Self {
            left: None,
            right: Some(right.clone()),
            join_key: key.map(str::to_owned),
            timestamp: right.timestamp,
        }
    }

    /// 양쪽이 모두 있는지 여부
    pub fn is_matched(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

/// 키별 이벤트 버퍼
#[derive(Default)]
struct JoinBuffer {
    by_key: HashMap<String, Vec<StreamEvent>>,
    len: usize,
}

impl JoinBuffer {
    fn get(&self, key: &str) -> &[StreamEvent] {
        self.by_key.get(key).map_or(&[][..], Vec::as_slice)
    }

    fn push(&mut self, key: String, event: StreamEvent) {
        self.by_key.entry(key).or_default().push(event);
        self.len += 1;
    }

    /// `cutoff`보다 오래된 이벤트를 제거하고 제거 수를 반환합니다.
    fn evict_before(&mut self, cutoff: i64) -> usize {
        let before = self.len;
        self.by_key.retain(|_, events| {
            events.retain(|e| e.timestamp >= cutoff);
            !events.is_empty()
        });
        self.len = self.by_key.values().map(Vec::len).sum();
        before - self.len
    }

    fn clear(&mut self) {
        self.by_key.clear();
        self.len = 0;
    }
}

/// 시스템 시각 (UNIX epoch 밀리초)
pub fn system_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// 스트림 조이너
///
/// 하나의 조이너는 한 쌍의 스트림(왼쪽, 오른쪽)을 담당합니다.
/// 호출마다 키 필드가 달라지면 버퍼의 키와 맞지 않습니다.
pub struct StreamJoiner {
    config: StreamJoinerConfig,
    left: JoinBuffer,
    right: JoinBuffer,
    clock: Clock,
}

impl fmt::Debug for StreamJoiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamJoiner")
            .field("config", &self.config)
            .field("left_buffered", &self.left.len)
            .field("right_buffered", &self.right.len)
            .finish()
    }
}

impl StreamJoiner {
    /// 시스템 시계를 쓰는 조이너를 생성합니다.
    pub fn new(config: StreamJoinerConfig) -> Self {
        Self {
            config,
            left: JoinBuffer::default(),
            right: JoinBuffer::default(),
            clock: Arc::new(system_clock_ms),
        }
    }

    /// 버퍼 정리에 쓸 시계를 교체합니다.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// 두 배치를 조인하고 이번 호출에서 새로 생긴 결과를 반환합니다.
    ///
    /// 결과 순서는 새 왼쪽 이벤트 순서, 그다음 새 오른쪽 이벤트 순서입니다.
    pub fn join_streams(
        &mut self,
        left: Vec<StreamEvent>,
        right: Vec<StreamEvent>,
        config: &JoinConfig,
    ) -> Result<Vec<JoinedEvent>, JoinError> {
        config.validate()?;
        let window = config.window_ms.unwrap_or(self.config.default_window_ms);
        let within = |a: &StreamEvent, b: &StreamEvent| a.timestamp.abs_diff(b.timestamp) <= window;

        let left = keyed(left, &config.left_key);
        let right = keyed(right, &config.right_key);

        // 새 오른쪽 이벤트 키 인덱스
        let mut right_index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, (key, _)) in right.iter().enumerate() {
            if let Some(key) = key {
                right_index.entry(key.as_str()).or_default().push(i);
            }
        }
        let mut right_matched = vec![false; right.len()];
        let mut results = Vec::new();

        for (key, l) in &left {
            let mut matched = false;
            if let Some(key) = key.as_deref() {
                for r in self.right.get(key).iter().filter(|&r| within(l, r)) {
                    results.push(JoinedEvent::pair(key, l, r));
                    matched = true;
                }
                for &i in right_index.get(key).map_or(&[][..], Vec::as_slice) {
                    let r = &right[i].1;
                    if within(l, r) {
                        results.push(JoinedEvent::pair(key, l, r));
                        right_matched[i] = true;
                        matched = true;
                    }
                }
            }
            if !matched && config.join_type.keeps_left() {
                results.push(JoinedEvent::left_only(key.as_deref(), l));
            }
        }

        for ((key, r), already) in right.iter().zip(right_matched) {
            let mut matched = already;
            if let Some(key) = key.as_deref() {
                for l in self.left.get(key).iter().filter(|&l| within(l, r)) {
                    results.push(JoinedEvent::pair(key, l, r));
                    matched = true;
                }
            }
            if !matched && config.join_type.keeps_right() {
                results.push(JoinedEvent::right_only(key.as_deref(), r));
            }
        }

        for (key, event) in left {
            if let Some(key) = key {
                self.left.push(key, event);
            }
        }
        for (key, event) in right {
            if let Some(key) = key {
                self.right.push(key, event);
            }
        }

        let evicted = self.evict(window);

        metrics::counter!(m::JOIN_RESULTS_TOTAL, m::LABEL_JOIN_TYPE => config.join_type.as_str())
            .increment(results.len() as u64);
        metrics::gauge!(m::JOIN_BUFFERED_EVENTS).set(self.buffered_len() as f64);
        debug!(
            join_type = %config.join_type,
            results = results.len(),
            evicted,
            buffered = self.buffered_len(),
            "join batch processed"
        );

        Ok(results)
    }

    /// 양쪽 버퍼에 남은 이벤트 수
    pub fn buffered_len(&self) -> usize {
        self.left.len + self.right.len
    }

    /// 버퍼를 비웁니다.
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        metrics::gauge!(m::JOIN_BUFFERED_EVENTS).set(0.0);
    }

    /// 조이너 설정
    pub fn config(&self) -> &StreamJoinerConfig {
        &self.config
    }

    fn evict(&mut self, window_ms: u64) -> usize {
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        let cutoff = (self.clock)().saturating_sub(window);
        let evicted = self.left.evict_before(cutoff) + self.right.evict_before(cutoff);
        if evicted > 0 {
            metrics::counter!(m::JOIN_EVICTED_TOTAL).increment(evicted as u64);
        }
        evicted
    }
}

fn keyed(events: Vec<StreamEvent>, field: &str) -> Vec<(Option<String>, StreamEvent)> {
    events
        .into_iter()
        .map(|e| (e.key_of(field), e))
        .collect()
}

//! 스트림 프로세서 -- 윈도우 상태, 워터마크, 집계/변환 진입점
//!
//! # 윈도우 수명
//! 1. 배치 이벤트를 타임스탬프 순으로 윈도우에 할당합니다.
//! 2. 워터마크를 배치의 최대 타임스탬프까지 전진시킵니다 (후퇴하지 않음).
//! 3. 허용 지연이 있으면 `end <= watermark - lateness`인 윈도우를 닫고,
//!    없으면 이번 배치가 건드린 윈도우를 모두 닫습니다.
//! 4. 이미 닫힌 윈도우에 속하는 이벤트는 버리고 지연 이벤트로 집계합니다.
//!
//! 닫힌 윈도우는 결과로 한 번 반환된 뒤 상태에서 제거됩니다.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use tideway_core::event::StreamEvent;
use tideway_core::metrics as m;
use tideway_core::notify::Notifier;
use tideway_core::store::StateStore;

use crate::aggregate::{AggregationConfig, AggregationResult, aggregate};
use crate::config::StreamProcessorConfig;
use crate::error::ProcessorError;
use crate::transform::{Transform, TransformOutput, apply_transform};
use crate::window::{Slot, Window, WindowConfig, WindowType, sliding_slots, tumbling_slot};

/// 워터마크 체크포인트 키
pub const WATERMARK_KEY: &str = "tideway.processor.watermark";

/// 프로세서 알림
#[derive(Debug, Clone)]
pub enum ProcessorNotification {
    /// 윈도우 종료
    WindowClosed(Window),
    /// 집계 결과
    Aggregation(AggregationResult),
}

/// 스트림 프로세서
pub struct StreamProcessor {
    config: StreamProcessorConfig,
    /// 열린 윈도우 (ID -> 윈도우)
    windows: HashMap<String, Window>,
    /// 닫힌 윈도우 ID -> 종료 시각
    closed: HashMap<String, i64>,
    watermark: Option<i64>,
    session_seq: u64,
    custom_seq: u64,
    late_events: u64,
    notifier: Notifier<ProcessorNotification>,
}

impl StreamProcessor {
    /// 새 프로세서를 생성합니다.
    pub fn new(config: StreamProcessorConfig) -> Self {
        Self {
            notifier: Notifier::new(config.notify_capacity),
            config,
            windows: HashMap::new(),
            closed: HashMap::new(),
            watermark: None,
            session_seq: 0,
            custom_seq: 0,
            late_events: 0,
        }
    }

    /// 배치를 윈도우에 할당하고 이번 호출에서 변경되거나 닫힌 윈도우를 반환합니다.
    pub fn process_window(
        &mut self,
        events: Vec<StreamEvent>,
        config: &WindowConfig,
    ) -> Result<Vec<Window>, ProcessorError> {
        config.validate()?;

        if config.window_type == WindowType::Custom {
            return self.split_custom(&events, config);
        }

        let lateness = config
            .allowed_lateness_ms
            .or(self.config.allowed_lateness_ms);
        let horizon = self.horizon(lateness);

        let mut sorted = events;
        sorted.sort_by_key(|e| e.timestamp);
        let batch_max = sorted.last().map(|e| e.timestamp);

        let mut touched: Vec<String> = Vec::new();
        let mut late = 0u64;

        for event in sorted {
            let assigned = match config.window_type {
                WindowType::Session => {
                    let gap = i64::try_from(config.gap_ms.unwrap_or_default()).unwrap_or(i64::MAX);
                    self.assign_session(event, gap, horizon)
                }
                WindowType::Tumbling => {
                    let slot = tumbling_slot(event.timestamp, config.size_ms.unwrap_or_default());
                    self.assign_slots(event, vec![slot], WindowType::Tumbling, horizon)
                }
                _ => {
                    let slots = sliding_slots(
                        event.timestamp,
                        config.size_ms.unwrap_or_default(),
                        config.slide_ms.unwrap_or_default(),
                    );
                    self.assign_slots(event, slots, WindowType::Sliding, horizon)
                }
            };
            match assigned {
                Assignment::Late => late += 1,
                Assignment::Windows(ids) => {
                    for id in ids {
                        if !touched.contains(&id) {
                            touched.push(id);
                        }
                    }
                }
            }
        }

        if late > 0 {
            self.late_events += late;
            metrics::counter!(m::PROCESSOR_LATE_EVENTS_TOTAL).increment(late);
            warn!(
                late,
                total_late = self.late_events,
                "dropped events for closed windows"
            );
        }

        if let Some(max) = batch_max {
            self.advance_watermark(max);
        }

        let to_close: Vec<String> = match lateness {
            None => touched.clone(),
            Some(_) => {
                let horizon = self.horizon(lateness);
                self.windows
                    .values()
                    .filter(|w| w.end <= horizon)
                    .map(|w| w.id.clone())
                    .collect()
            }
        };

        let mut result: BTreeMap<(i64, String), Window> = BTreeMap::new();
        for id in to_close {
            if let Some(window) = self.close(&id) {
                result.insert((window.start, window.id.clone()), window);
            }
        }
        for id in &touched {
            if let Some(window) = self.windows.get(id) {
                result.insert((window.start, window.id.clone()), window.clone());
            }
        }

        self.prune_closed(lateness);
        metrics::gauge!(m::PROCESSOR_OPEN_WINDOWS).set(self.windows.len() as f64);

        Ok(result.into_values().collect())
    }

    /// 닫힌 윈도우를 집계하고 윈도우마다 결과를 한 번 알립니다.
    pub fn aggregate(
        &self,
        windows: &[Window],
        config: &AggregationConfig,
    ) -> Result<Vec<AggregationResult>, ProcessorError> {
        let results = aggregate(windows, config)?;
        for result in &results {
            self.notifier
                .emit(ProcessorNotification::Aggregation(result.clone()));
        }
        debug!(
            aggregation = config.aggregation.name(),
            windows = results.len(),
            "aggregation complete"
        );
        Ok(results)
    }

    /// 이벤트 목록에 변환을 적용합니다.
    pub fn transform(
        &self,
        events: &[StreamEvent],
        transform: &Transform,
    ) -> Result<TransformOutput, ProcessorError> {
        let output = apply_transform(events, transform)?;
        debug!(
            transform = transform.name(),
            input = events.len(),
            "transform applied"
        );
        Ok(output)
    }

    /// 워터마크를 상태 저장소에 기록합니다.
    pub async fn checkpoint<S: StateStore>(&self, store: &S) -> Result<(), ProcessorError> {
        let value = self
            .watermark
            .map_or(serde_json::Value::Null, serde_json::Value::from);
        store.put(WATERMARK_KEY, value).await?;
        debug!(watermark = ?self.watermark, "processor checkpoint written");
        Ok(())
    }

    /// 상태 저장소에서 워터마크를 복원합니다. 저장된 값이 없으면 변경하지 않습니다.
    pub async fn restore<S: StateStore>(&mut self, store: &S) -> Result<(), ProcessorError> {
        if let Some(value) = store.get(WATERMARK_KEY).await? {
            if let Some(wm) = value.as_i64() {
                self.advance_watermark(wm);
                info!(watermark = wm, "processor watermark restored");
            }
        }
        Ok(())
    }

    /// 알림 구독자를 등록합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessorNotification> {
        self.notifier.subscribe()
    }

    /// 현재 워터마크
    pub fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    /// 열린 윈도우 수
    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }

    /// 지연으로 버려진 이벤트 수
    pub fn late_event_count(&self) -> u64 {
        self.late_events
    }

    // ─── 내부 ───────────────────────────────────────────────────────

    /// 이 시각 이하에서 끝나는 윈도우는 닫힌 것으로 간주
    fn horizon(&self, lateness: Option<u64>) -> i64 {
        let lateness = i64::try_from(lateness.unwrap_or(0)).unwrap_or(i64::MAX);
        self.watermark
            .map_or(i64::MIN, |wm| wm.saturating_sub(lateness))
    }

    fn advance_watermark(&mut self, ts: i64) {
        if self.watermark.is_none_or(|wm| ts > wm) {
            self.watermark = Some(ts);
            metrics::gauge!(m::PROCESSOR_WATERMARK).set(ts as f64);
        }
    }

    fn is_closed(&self, id: &str, end: i64, horizon: i64) -> bool {
        end <= horizon || self.closed.contains_key(id)
    }

    fn assign_slots(
        &mut self,
        event: StreamEvent,
        slots: Vec<Slot>,
        window_type: WindowType,
        horizon: i64,
    ) -> Assignment {
        let open: Vec<Slot> = slots
            .into_iter()
            .filter(|s| !self.is_closed(&s.id, s.end, horizon))
            .collect();
        if open.is_empty() {
            return Assignment::Late;
        }
        let ids = open.iter().map(|s| s.id.clone()).collect();
        for slot in open {
            self.windows
                .entry(slot.id.clone())
                .or_insert_with(|| Window::new(slot.id, window_type, slot.start, slot.end))
                .events
                .push(event.clone());
        }
        Assignment::Windows(ids)
    }

    fn assign_session(&mut self, event: StreamEvent, gap: i64, horizon: i64) -> Assignment {
        let ts = event.timestamp;
        // 간격 안에 있는 열린 세션 중 마지막 이벤트가 가장 최근인 것 (동률이면 나중에 연 세션)
        let existing = self
            .windows
            .values_mut()
            .filter(|w| w.window_type == WindowType::Session)
            .filter(|w| ts <= w.end && ts.saturating_add(gap) >= w.start)
            .max_by_key(|w| (last_event_ts(w), session_seq(&w.id)));

        if let Some(window) = existing {
            window.start = window.start.min(ts);
            // 현재 끝보다 뒤처진 지연 이벤트는 세션을 줄이지 않음
            window.end = window.end.max(ts.saturating_add(gap));
            window.events.push(event);
            return Assignment::Windows(vec![window.id.clone()]);
        }

        let end = ts.saturating_add(gap);
        if end <= horizon {
            return Assignment::Late;
        }
        self.session_seq += 1;
        let id = format!("session:{}", self.session_seq);
        let mut window = Window::new(id.clone(), WindowType::Session, ts, end);
        window.events.push(event);
        self.windows.insert(id.clone(), window);
        Assignment::Windows(vec![id])
    }

    fn split_custom(
        &mut self,
        events: &[StreamEvent],
        config: &WindowConfig,
    ) -> Result<Vec<Window>, ProcessorError> {
        let splitter = config.splitter.as_ref().ok_or_else(|| {
            ProcessorError::WindowConfig("custom window requires a splitter".to_owned())
        })?;
        if let Some(max) = events.iter().map(|e| e.timestamp).max() {
            self.advance_watermark(max);
        }

        let mut out = Vec::new();
        for group in splitter(events) {
            if group.is_empty() {
                continue;
            }
            self.custom_seq += 1;
            let start = group.iter().map(|e| e.timestamp).min().unwrap_or_default();
            let end = group.iter().map(|e| e.timestamp).max().unwrap_or_default();
            let mut window = Window::new(
                format!("custom:{}", self.custom_seq),
                WindowType::Custom,
                start,
                end,
            );
            window.events = group;
            window.closed = true;
            self.notify_closed(&window);
            out.push(window);
        }
        Ok(out)
    }

    fn close(&mut self, id: &str) -> Option<Window> {
        let mut window = self.windows.remove(id)?;
        window.closed = true;
        self.closed.insert(window.id.clone(), window.end);
        self.notify_closed(&window);
        Some(window)
    }

    fn notify_closed(&self, window: &Window) {
        metrics::counter!(m::PROCESSOR_WINDOWS_CLOSED_TOTAL).increment(1);
        debug!(
            window_id = %window.id,
            events = window.events.len(),
            start = window.start,
            end = window.end,
            "window closed"
        );
        self.notifier
            .emit(ProcessorNotification::WindowClosed(window.clone()));
    }

    /// 워터마크 기준으로 이미 늦은 윈도우의 ID는 추적할 필요가 없음
    fn prune_closed(&mut self, lateness: Option<u64>) {
        let horizon = self.horizon(lateness);
        self.closed.retain(|_, end| *end > horizon);
    }
}

enum Assignment {
    Windows(Vec<String>),
    Late,
}

fn last_event_ts(window: &Window) -> i64 {
    window
        .events
        .iter()
        .map(|e| e.timestamp)
        .max()
        .unwrap_or(window.start)
}

fn session_seq(id: &str) -> u64 {
    id.strip_prefix("session:")
        .and_then(|n| n.parse().ok())
        .unwrap_or_default()
}

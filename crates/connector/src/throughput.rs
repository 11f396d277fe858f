//! 처리량 카운터와 롤링 샘플러
//!
//! 카운터는 커넥터와 메트릭 태스크가 공유하며 (재)연결할 때 초기화됩니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// 커넥터 처리량 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThroughputMetrics {
    /// 수신 레코드 수
    pub records_in: u64,
    /// 송신 레코드 수
    pub records_out: u64,
    /// 롤링 윈도우 기준 초당 수신 이벤트 수
    pub events_per_second: f64,
}

/// 공유 카운터
#[derive(Debug, Default)]
pub(crate) struct Counters {
    records_in: AtomicU64,
    records_out: AtomicU64,
    /// f64 비트 표현
    events_per_second: AtomicU64,
}

impl Counters {
    pub(crate) fn reset(&self) {
        self.records_in.store(0, Ordering::Relaxed);
        self.records_out.store(0, Ordering::Relaxed);
        self.events_per_second.store(0f64.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_in(&self) {
        self.records_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_out(&self) {
        self.records_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn records_in(&self) -> u64 {
        self.records_in.load(Ordering::Relaxed)
    }

    pub(crate) fn set_events_per_second(&self, eps: f64) {
        self.events_per_second.store(eps.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ThroughputMetrics {
        ThroughputMetrics {
            records_in: self.records_in.load(Ordering::Relaxed),
            records_out: self.records_out.load(Ordering::Relaxed),
            events_per_second: f64::from_bits(self.events_per_second.load(Ordering::Relaxed)),
        }
    }
}

/// 최근 N개 구간의 수신 증가량으로 초당 이벤트 수를 계산
#[derive(Debug)]
pub(crate) struct ThroughputSampler {
    deltas: VecDeque<u64>,
    capacity: usize,
    last_total: u64,
    interval_secs: f64,
}

impl ThroughputSampler {
    pub(crate) fn new(capacity: usize, interval: Duration) -> Self {
        Self {
            deltas: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            last_total: 0,
            interval_secs: interval.as_secs_f64(),
        }
    }

    /// 누적 수신 수를 기록하고 현재 초당 이벤트 수를 반환합니다.
    pub(crate) fn sample(&mut self, total: u64) -> f64 {
        let delta = total.saturating_sub(self.last_total);
        self.last_total = total;
        if self.deltas.len() == self.capacity {
            self.deltas.pop_front();
        }
        self.deltas.push_back(delta);

        let span = self.deltas.len() as f64 * self.interval_secs;
        if span > 0.0 {
            self.deltas.iter().sum::<u64>() as f64 / span
        } else {
            0.0
        }
    }
}

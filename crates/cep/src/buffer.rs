//! 이벤트 버퍼 -- FIFO 상한 인메모리 버퍼
//!
//! [`EventBuffer`]는 CEP 엔진이 패턴 평가에 사용하는 이벤트를 보관합니다.
//!
//! # 오버플로우 정책
//! 버퍼가 가득 차면 가장 오래된 이벤트를 제거합니다.
//! 생산자에게 역압 신호는 전달되지 않으며, 제거된 이벤트가 관여했을
//! 매칭은 더 이상 탐지되지 않습니다.

use std::collections::VecDeque;

use tideway_core::event::StreamEvent;

/// FIFO 상한 이벤트 버퍼
pub struct EventBuffer {
    /// 버퍼 내부 저장소 (도착 순서)
    buffer: VecDeque<StreamEvent>,
    /// 최대 용량
    capacity: usize,
    /// 제거된 이벤트 카운터
    dropped_count: u64,
    /// 총 유입 이벤트 카운터
    total_received: u64,
}

impl EventBuffer {
    /// 새 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            dropped_count: 0,
            total_received: 0,
        }
    }

    /// 이벤트를 추가합니다.
    ///
    /// 용량을 초과하면 가장 오래된 이벤트를 제거하고 `true`를 반환합니다.
    pub fn push(&mut self, event: StreamEvent) -> bool {
        self.total_received += 1;

        let mut dropped = false;
        while self.buffer.len() >= self.capacity && !self.buffer.is_empty() {
            self.buffer.pop_front();
            self.dropped_count += 1;
            dropped = true;
        }
        if dropped {
            tracing::warn!(
                dropped = self.dropped_count,
                capacity = self.capacity,
                "event buffer full, dropped oldest event"
            );
        }

        self.buffer.push_back(event);
        dropped
    }

    /// 도착 순서대로 이벤트를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.buffer.iter()
    }

    /// 버퍼를 비웁니다.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// 현재 버퍼에 저장된 이벤트 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 버퍼 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 제거된 이벤트 수를 반환합니다.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// 총 유입 이벤트 수를 반환합니다.
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 버퍼 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(u32::try_from(self.buffer.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_event(n: i64) -> StreamEvent {
        StreamEvent::new(format!("k{n}"), json!({"n": n}), n)
    }

    #[test]
    fn push_within_capacity_keeps_all() {
        let mut buf = EventBuffer::new(10);
        for i in 0..3 {
            assert!(!buf.push(make_event(i)));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        for i in 0..3 {
            buf.push(make_event(i));
        }
        let dropped = buf.push(make_event(3));
        assert!(dropped);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped_count(), 1);

        let keys: Vec<_> = buf.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn stays_at_capacity_with_most_recent_events() {
        let mut buf = EventBuffer::new(5);
        for i in 0..100 {
            buf.push(make_event(i));
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.total_received(), 100);
        assert_eq!(buf.dropped_count(), 95);
        let stamps: Vec<_> = buf.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![95, 96, 97, 98, 99]);
    }

    #[test]
    fn utilization_calculation() {
        let mut buf = EventBuffer::new(100);
        assert_eq!(buf.utilization(), 0.0);
        for i in 0..50 {
            buf.push(make_event(i));
        }
        let util = buf.utilization();
        assert!(util > 0.49 && util < 0.51);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buf = EventBuffer::new(4);
        buf.push(make_event(1));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_received(), 1);
    }
}

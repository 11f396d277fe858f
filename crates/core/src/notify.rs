//! 알림 채널: 컴포넌트 결과를 구독자에게 전달합니다.
//!
//! 각 컴포넌트(CEP 엔진, 프로세서, 커넥터)는 자신만의 알림 열거형을 정의하고
//! [`Notifier`]로 발행합니다. 구독자는 [`Notifier::subscribe`]로 받은
//! `broadcast::Receiver`에서 타입이 보장된 알림을 수신합니다.
//!
//! 발행은 동기 코드에서도 호출할 수 있으며, 구독자가 없으면 알림은 버려집니다.
//! 느린 구독자는 `RecvError::Lagged`를 받습니다.

use tokio::sync::broadcast;

/// 기본 알림 채널 용량
pub const DEFAULT_NOTIFY_CAPACITY: usize = 1024;

/// 타입이 지정된 알림 발행기
#[derive(Debug, Clone)]
pub struct Notifier<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> Notifier<E> {
    /// 지정한 용량으로 발행기를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 새 구독자를 등록합니다. 등록 이후의 알림만 수신합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// 알림을 발행합니다.
    ///
    /// 전달된 구독자 수를 반환합니다. 구독자가 없으면 0입니다.
    pub fn emit(&self, event: E) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// 현재 구독자 수를 반환합니다.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone> Default for Notifier<E> {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_CAPACITY)
    }
}

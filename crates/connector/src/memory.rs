//! 메모리 어댑터 -- tokio 채널 기반 [`PlatformAdapter`]
//!
//! [`memory_channel`]은 팩토리와 반대편 엔드포인트를 함께 만듭니다.
//! 엔드포인트로 보낸 레코드는 커넥터의 `consume`으로, 커넥터가 `produce`한 레코드는
//! 엔드포인트로 전달됩니다. 재연결해도 같은 채널을 공유합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};

use tideway_core::event::StreamEvent;

use crate::adapter::{AdapterFactory, PlatformAdapter};
use crate::config::ConnectionSettings;
use crate::error::ConnectorError;
use crate::platform::Platform;

/// 메모리 어댑터 팩토리와 엔드포인트를 생성합니다.
pub fn memory_channel(capacity: usize) -> (MemoryAdapterFactory, MemoryEndpoint) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
    let factory = MemoryAdapterFactory {
        inbound: Arc::new(Mutex::new(inbound_rx)),
        outbound: outbound_tx,
        pending_failures: Arc::new(AtomicU32::new(0)),
        connect_attempts: Arc::new(AtomicU32::new(0)),
    };
    let endpoint = MemoryEndpoint {
        tx: Some(inbound_tx),
        rx: outbound_rx,
    };
    (factory, endpoint)
}

/// 메모리 어댑터 팩토리
#[derive(Debug, Clone)]
pub struct MemoryAdapterFactory {
    inbound: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    outbound: mpsc::Sender<Bytes>,
    pending_failures: Arc<AtomicU32>,
    connect_attempts: Arc<AtomicU32>,
}

impl MemoryAdapterFactory {
    /// 다음 `count`번의 연결 시도를 실패시킵니다.
    pub fn fail_next_connects(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// 지금까지의 연결 시도 횟수
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

impl AdapterFactory for MemoryAdapterFactory {
    type Adapter = MemoryAdapter;

    fn create(&self, settings: &ConnectionSettings) -> Result<MemoryAdapter, ConnectorError> {
        Ok(MemoryAdapter {
            platform: settings.platform,
            inbound: Arc::clone(&self.inbound),
            outbound: self.outbound.clone(),
            pending_failures: Arc::clone(&self.pending_failures),
            connect_attempts: Arc::clone(&self.connect_attempts),
            connected: false,
        })
    }
}

/// 메모리 어댑터
#[derive(Debug)]
pub struct MemoryAdapter {
    platform: Platform,
    inbound: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    outbound: mpsc::Sender<Bytes>,
    pending_failures: Arc<AtomicU32>,
    connect_attempts: Arc<AtomicU32>,
    connected: bool,
}

impl PlatformAdapter for MemoryAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ConnectorError::Connection {
                platform: self.platform.to_string(),
                reason: "injected connect failure".to_owned(),
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.connected = false;
        Ok(())
    }

    async fn consume(&mut self) -> Result<Option<Bytes>, ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn produce(&mut self, record: Bytes) -> Result<(), ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        self.outbound
            .send(record)
            .await
            .map_err(|_| ConnectorError::Produce("memory endpoint closed".to_owned()))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// 메모리 어댑터의 반대편
#[derive(Debug)]
pub struct MemoryEndpoint {
    tx: Option<mpsc::Sender<Bytes>>,
    rx: mpsc::Receiver<Bytes>,
}

impl MemoryEndpoint {
    /// 인코딩되지 않은 레코드를 보냅니다.
    pub async fn send_raw(&self, record: Bytes) -> Result<(), ConnectorError> {
        let tx = self.tx.as_ref().ok_or_else(closed)?;
        tx.send(record).await.map_err(|_| closed())
    }

    /// 이벤트를 인코딩해 보냅니다.
    pub async fn send_event(&self, event: &StreamEvent) -> Result<(), ConnectorError> {
        self.send_raw(event.to_bytes()?).await
    }

    /// 입력 스트림을 닫습니다. 남은 레코드를 모두 읽은 뒤 `consume`이 끝납니다.
    pub fn finish(&mut self) {
        self.tx = None;
    }

    /// 커넥터가 보낸 다음 레코드
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// 커넥터가 보낸 다음 이벤트
    pub async fn recv_event(&mut self) -> Result<Option<StreamEvent>, ConnectorError> {
        match self.rx.recv().await {
            Some(record) => Ok(Some(StreamEvent::from_bytes(&record)?)),
            None => Ok(None),
        }
    }
}

fn closed() -> ConnectorError {
    ConnectorError::Consume("memory channel closed".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            platform: Platform::Nats,
            endpoint: "memory".to_owned(),
            topic: "t".to_owned(),
        }
    }

    #[tokio::test]
    async fn round_trip_through_channels() {
        let (factory, mut endpoint) = memory_channel(8);
        let mut adapter = factory.create(&settings()).unwrap();
        assert_eq!(adapter.platform(), Platform::Nats);
        adapter.connect().await.unwrap();

        let event = StreamEvent::new("k", json!({"n": 1}), 10);
        endpoint.send_event(&event).await.unwrap();
        let raw = adapter.consume().await.unwrap().unwrap();
        assert_eq!(StreamEvent::from_bytes(&raw).unwrap(), event);

        adapter.produce(event.to_bytes().unwrap()).await.unwrap();
        assert_eq!(endpoint.recv_event().await.unwrap(), Some(event));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (factory, _endpoint) = memory_channel(1);
        factory.fail_next_connects(2);
        let mut adapter = factory.create(&settings()).unwrap();
        assert!(adapter.connect().await.is_err());
        assert!(adapter.connect().await.is_err());
        adapter.connect().await.unwrap();
        assert!(adapter.is_connected());
        assert_eq!(factory.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn consume_requires_connection() {
        let (factory, _endpoint) = memory_channel(1);
        let mut adapter = factory.create(&settings()).unwrap();
        assert!(matches!(
            adapter.consume().await,
            Err(ConnectorError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn finish_ends_stream() {
        let (factory, mut endpoint) = memory_channel(4);
        let mut adapter = factory.create(&settings()).unwrap();
        adapter.connect().await.unwrap();
        endpoint.send_raw(Bytes::from_static(b"x")).await.unwrap();
        endpoint.finish();
        assert!(adapter.consume().await.unwrap().is_some());
        assert!(adapter.consume().await.unwrap().is_none());
        assert!(endpoint.send_raw(Bytes::from_static(b"y")).await.is_err());
    }
}

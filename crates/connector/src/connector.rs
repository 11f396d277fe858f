//! 커넥터 -- 어댑터 수명, 재연결, 소비/전송, 처리량 메트릭
//!
//! # 재연결
//! 연결 단계의 실패만 재연결을 유발합니다. `attempt`번째 재연결 전에
//! `base * 2^(attempt - 1)`만큼 대기하며 `max_reconnect_attempts`회 이후에는
//! `MaxReconnectAttempts`를 알리고 연결 해제 상태로 돌아갑니다.
//!
//! # 종료
//! [`Connector::shutdown_token`]을 취소하면 진행 중인 `consume`이 다음 레코드를
//! 기다리는 지점에서 멈추고 메트릭 태스크가 종료됩니다. 실행 중인 핸들러는
//! 중단되지 않습니다. [`Connector::disconnect`]는 토큰을 취소하고 어댑터를 정리합니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tideway_core::event::StreamEvent;
use tideway_core::metrics as m;
use tideway_core::notify::Notifier;

use crate::adapter::{AdapterFactory, PlatformAdapter};
use crate::config::ConnectorSettings;
use crate::error::ConnectorError;
use crate::platform::Platform;
use crate::throughput::{Counters, ThroughputMetrics, ThroughputSampler};

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 연결 안 됨
    Disconnected,
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Connected,
    /// 재연결 대기 중
    Reconnecting,
    /// 연결 시도 실패 직후
    Error,
}

/// 커넥터 알림
#[derive(Debug, Clone)]
pub enum ConnectorNotification {
    /// 연결 성공
    Connected {
        /// 플랫폼
        platform: Platform,
    },
    /// 연결 해제
    Disconnected {
        /// 플랫폼
        platform: Platform,
    },
    /// 재연결 예정
    Reconnecting {
        /// 재연결 시도 번호 (1부터)
        attempt: u32,
        /// 대기 시간
        delay: Duration,
    },
    /// 재연결 한도 초과
    MaxReconnectAttempts {
        /// 시도한 재연결 횟수
        attempts: u32,
    },
    /// 처리량 샘플
    Metrics(ThroughputMetrics),
    /// 이벤트 수신
    Event(StreamEvent),
    /// 이벤트 전송 완료
    Produced {
        /// 전송한 이벤트 ID
        event_id: String,
    },
    /// 에러
    Error(String),
}

/// 스트림 커넥터
pub struct Connector<F: AdapterFactory> {
    settings: ConnectorSettings,
    factory: F,
    adapter: Option<F::Adapter>,
    state: ConnectionState,
    counters: Arc<Counters>,
    notifier: Notifier<ConnectorNotification>,
    shutdown: CancellationToken,
    metrics_task: Option<JoinHandle<()>>,
}

impl<F: AdapterFactory> fmt::Debug for Connector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("platform", &self.settings.connection.platform)
            .field("state", &self.state)
            .field("metrics", &self.counters.snapshot())
            .finish()
    }
}

impl<F: AdapterFactory> Connector<F> {
    /// 새 커넥터를 생성합니다. 연결은 [`connect`](Self::connect)에서 수행합니다.
    pub fn new(settings: ConnectorSettings, factory: F) -> Self {
        Self {
            notifier: Notifier::new(settings.notify_capacity),
            settings,
            factory,
            adapter: None,
            state: ConnectionState::Disconnected,
            counters: Arc::new(Counters::default()),
            shutdown: CancellationToken::new(),
            metrics_task: None,
        }
    }

    /// 어댑터를 생성하고 연결합니다. 실패하면 지수 백오프로 재연결합니다.
    pub async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.is_connected() {
            return Ok(());
        }
        self.settings.validate()?;
        let platform = self.settings.connection.platform;

        // 연결이 끊긴 이전 어댑터와 메트릭 태스크 정리
        if self.adapter.is_some() || self.metrics_task.is_some() {
            debug!(platform = %platform, "releasing stale connection before reconnect");
            if let Some(Err(err)) = self.release().await {
                warn!(platform = %platform, error = %err, "stale adapter disconnect failed");
            }
        }

        let mut attempt: u32 = 0;

        loop {
            self.state = ConnectionState::Connecting;
            // 어댑터 생성 실패는 설정 문제이므로 재시도하지 않음
            let mut adapter = self.factory.create(&self.settings.connection)?;

            match adapter.connect().await {
                Ok(()) => {
                    self.on_connected(adapter);
                    info!(platform = %platform, reconnects = attempt, "connector connected");
                    return Ok(());
                }
                Err(err) => {
                    self.state = ConnectionState::Error;
                    warn!(platform = %platform, attempt, error = %err, "connect failed");
                    self.notifier
                        .emit(ConnectorNotification::Error(err.to_string()));

                    if attempt >= self.settings.max_reconnect_attempts {
                        self.state = ConnectionState::Disconnected;
                        error!(
                            platform = %platform,
                            attempts = attempt,
                            "giving up after max reconnect attempts"
                        );
                        self.notifier
                            .emit(ConnectorNotification::MaxReconnectAttempts { attempts: attempt });
                        return Err(ConnectorError::MaxReconnectAttempts { attempts: attempt });
                    }

                    attempt += 1;
                    let delay = self.settings.reconnect_delay(attempt);
                    self.state = ConnectionState::Reconnecting;
                    metrics::counter!(
                        m::CONNECTOR_RECONNECT_ATTEMPTS_TOTAL,
                        m::LABEL_PLATFORM => platform.as_str()
                    )
                    .increment(1);
                    info!(
                        platform = %platform,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "reconnecting"
                    );
                    self.notifier
                        .emit(ConnectorNotification::Reconnecting { attempt, delay });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// 메트릭 태스크를 멈추고 어댑터 연결을 종료합니다.
    pub async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        let released = self.release().await;
        self.state = ConnectionState::Disconnected;
        let Some(result) = released else {
            return Ok(());
        };

        let platform = self.settings.connection.platform;
        if let Err(err) = &result {
            warn!(platform = %platform, error = %err, "adapter disconnect failed");
            self.notifier
                .emit(ConnectorNotification::Error(err.to_string()));
        }
        info!(platform = %platform, "connector disconnected");
        self.notifier
            .emit(ConnectorNotification::Disconnected { platform });
        result
    }

    /// 레코드를 하나씩 디코딩해 핸들러에 전달합니다.
    ///
    /// 핸들러가 완료되어야 다음 레코드를 읽습니다. 스트림이 끝나거나
    /// 종료 토큰이 취소되면 전달한 이벤트 수를 반환합니다.
    /// 디코딩할 수 없는 레코드는 `Error` 알림 후 건너뜁니다.
    pub async fn consume<H, Fut, E>(&mut self, mut handler: H) -> Result<u64, ConnectorError>
    where
        H: FnMut(StreamEvent) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let shutdown = self.shutdown.clone();
        let platform = self.settings.connection.platform;
        let mut delivered = 0u64;

        loop {
            let adapter = self
                .adapter
                .as_mut()
                .filter(|a| a.is_connected())
                .ok_or(ConnectorError::NotConnected)?;

            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(platform = %platform, delivered, "consume stopped by shutdown");
                    break;
                }
                next = adapter.consume() => next,
            };

            let record = match next {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!(platform = %platform, delivered, "stream ended");
                    break;
                }
                Err(err) => {
                    warn!(platform = %platform, error = %err, "consume failed");
                    self.notifier
                        .emit(ConnectorNotification::Error(err.to_string()));
                    return Err(err);
                }
            };

            let event = match StreamEvent::from_bytes(&record) {
                Ok(event) => event,
                Err(err) => {
                    warn!(platform = %platform, error = %err, bytes = record.len(), "skipping undecodable record");
                    self.notifier
                        .emit(ConnectorNotification::Error(err.to_string()));
                    continue;
                }
            };

            self.counters.record_in();
            metrics::counter!(m::CONNECTOR_RECORDS_IN_TOTAL, m::LABEL_PLATFORM => platform.as_str())
                .increment(1);
            self.notifier
                .emit(ConnectorNotification::Event(event.clone()));

            if let Err(e) = handler(event).await {
                let err = ConnectorError::Handler(e.to_string());
                warn!(platform = %platform, error = %err, "consume handler failed");
                self.notifier
                    .emit(ConnectorNotification::Error(err.to_string()));
                return Err(err);
            }
            delivered += 1;
        }

        Ok(delivered)
    }

    /// 이벤트를 인코딩해 전송합니다.
    pub async fn produce(&mut self, event: &StreamEvent) -> Result<(), ConnectorError> {
        let platform = self.settings.connection.platform;
        let adapter = self
            .adapter
            .as_mut()
            .filter(|a| a.is_connected())
            .ok_or(ConnectorError::NotConnected)?;
        let record = event.to_bytes()?;

        if let Err(err) = adapter.produce(record).await {
            warn!(platform = %platform, event_id = %event.id, error = %err, "produce failed");
            self.notifier
                .emit(ConnectorNotification::Error(err.to_string()));
            return Err(err);
        }

        self.counters.record_out();
        metrics::counter!(m::CONNECTOR_RECORDS_OUT_TOTAL, m::LABEL_PLATFORM => platform.as_str())
            .increment(1);
        self.notifier.emit(ConnectorNotification::Produced {
            event_id: event.id.clone(),
        });
        Ok(())
    }

    /// 알림 구독자를 등록합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorNotification> {
        self.notifier.subscribe()
    }

    /// 현재 연결의 종료 토큰
    ///
    /// `disconnect`나 재연결 이후에는 새 토큰으로 교체되므로 다시 받아야 합니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 현재 상태
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 연결 여부
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.adapter.as_ref().is_some_and(|a| a.is_connected())
    }

    /// 처리량 스냅샷
    pub fn metrics(&self) -> ThroughputMetrics {
        self.counters.snapshot()
    }

    /// 커넥터 설정
    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    // ─── 내부 ───────────────────────────────────────────────────────

    /// 종료 토큰을 취소 후 교체하고 메트릭 태스크를 기다린 뒤 어댑터를 떼어냅니다.
    ///
    /// 어댑터가 있었으면 그 `disconnect` 결과를 반환합니다.
    async fn release(&mut self) -> Option<Result<(), ConnectorError>> {
        self.shutdown.cancel();
        self.shutdown = CancellationToken::new();
        if let Some(task) = self.metrics_task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "metrics task ended abnormally");
        }
        let mut adapter = self.adapter.take()?;
        Some(adapter.disconnect().await)
    }

    fn on_connected(&mut self, adapter: F::Adapter) {
        let platform = adapter.platform();
        self.counters.reset();
        self.adapter = Some(adapter);
        self.state = ConnectionState::Connected;
        self.metrics_task = Some(self.spawn_metrics_task());
        self.notifier
            .emit(ConnectorNotification::Connected { platform });
    }

    fn spawn_metrics_task(&self) -> JoinHandle<()> {
        let counters = Arc::clone(&self.counters);
        let notifier = self.notifier.clone();
        let cancel = self.shutdown.child_token();
        let interval = self.settings.metrics_interval;
        let mut sampler = ThroughputSampler::new(self.settings.metrics_window, interval);
        let platform = self.settings.connection.platform;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let eps = sampler.sample(counters.records_in());
                        counters.set_events_per_second(eps);
                        metrics::gauge!(
                            m::CONNECTOR_EVENTS_PER_SECOND,
                            m::LABEL_PLATFORM => platform.as_str()
                        )
                        .set(eps);
                        notifier.emit(ConnectorNotification::Metrics(counters.snapshot()));
                    }
                }
            }
            debug!(platform = %platform, "metrics task stopped");
        })
    }
}

impl<F: AdapterFactory> Drop for Connector<F> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

//! 커넥터 설정
//!
//! [`ConnectorSettings`]는 core의 `[connector]` 섹션에서 파생됩니다.
//! 플랫폼 이름은 이 시점에 [`Platform`]으로 해석되며 알 수 없는 이름은 설정 에러입니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;
use crate::platform::Platform;

/// 처리량 샘플 보관 개수
pub const DEFAULT_METRICS_WINDOW: usize = 60;

/// 어댑터 생성에 전달되는 접속 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// 플랫폼
    pub platform: Platform,
    /// 접속 주소
    pub endpoint: String,
    /// 토픽/스트림/큐 이름
    pub topic: String,
}

/// 커넥터 설정
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// 접속 정보
    pub connection: ConnectionSettings,
    /// 재연결 기본 지연
    pub reconnect_base_delay: Duration,
    /// 최대 재연결 횟수
    pub max_reconnect_attempts: u32,
    /// 처리량 샘플링 간격
    pub metrics_interval: Duration,
    /// 처리량 롤링 윈도우 샘플 수
    pub metrics_window: usize,
    /// 알림 채널 용량
    pub notify_capacity: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        let core = tideway_core::config::ConnectorConfig::default();
        Self {
            connection: ConnectionSettings {
                platform: Platform::Kafka,
                endpoint: core.endpoint,
                topic: core.topic,
            },
            reconnect_base_delay: Duration::from_millis(core.reconnect_base_delay_ms),
            max_reconnect_attempts: core.max_reconnect_attempts,
            metrics_interval: Duration::from_millis(core.metrics_interval_ms),
            metrics_window: DEFAULT_METRICS_WINDOW,
            notify_capacity: tideway_core::notify::DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

impl ConnectorSettings {
    /// core 설정에서 생성합니다.
    pub fn from_core(core: &tideway_core::config::ConnectorConfig) -> Result<Self, ConnectorError> {
        let settings = Self {
            connection: ConnectionSettings {
                platform: core.platform.parse()?,
                endpoint: core.endpoint.clone(),
                topic: core.topic.clone(),
            },
            reconnect_base_delay: Duration::from_millis(core.reconnect_base_delay_ms),
            max_reconnect_attempts: core.max_reconnect_attempts,
            metrics_interval: Duration::from_millis(core.metrics_interval_ms),
            metrics_window: DEFAULT_METRICS_WINDOW,
            notify_capacity: tideway_core::notify::DEFAULT_NOTIFY_CAPACITY,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 플랫폼을 지정합니다.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.connection.platform = platform;
        self
    }

    /// 재연결 정책을 지정합니다.
    pub fn with_reconnect(mut self, base_delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_base_delay = base_delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// 처리량 샘플링 간격을 지정합니다.
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// `attempt`번째 재연결 전 지연 (`base * 2^(attempt - 1)`)
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.reconnect_base_delay.saturating_mul(factor)
    }

    /// 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.connection.endpoint.is_empty() {
            return Err(config_error("endpoint", "must not be empty"));
        }
        if self.reconnect_base_delay.is_zero() {
            return Err(config_error("reconnect_base_delay", "must be greater than 0"));
        }
        if self.metrics_interval.is_zero() {
            return Err(config_error("metrics_interval", "must be greater than 0"));
        }
        if self.metrics_window == 0 {
            return Err(config_error("metrics_window", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: &str) -> ConnectorError {
    ConnectorError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

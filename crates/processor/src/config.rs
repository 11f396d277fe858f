//! 프로세서 설정
//!
//! core의 [`ProcessorConfig`](tideway_core::config::ProcessorConfig)에서 파생됩니다.

use serde::{Deserialize, Serialize};

/// 스트림 프로세서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamProcessorConfig {
    /// 기본 허용 지연 (밀리초). `None`이면 배치마다 관련 윈도우를 모두 닫습니다.
    pub allowed_lateness_ms: Option<u64>,
    /// 알림 채널 용량
    pub notify_capacity: usize,
}

impl Default for StreamProcessorConfig {
    fn default() -> Self {
        Self::from_core(&tideway_core::config::ProcessorConfig::default())
    }
}

impl StreamProcessorConfig {
    /// core 설정에서 생성합니다.
    pub fn from_core(core: &tideway_core::config::ProcessorConfig) -> Self {
        Self {
            allowed_lateness_ms: core.allowed_lateness_ms,
            notify_capacity: tideway_core::notify::DEFAULT_NOTIFY_CAPACITY,
        }
    }

    /// 허용 지연을 지정합니다.
    pub fn with_allowed_lateness(mut self, lateness_ms: u64) -> Self {
        self.allowed_lateness_ms = Some(lateness_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_lateness() {
        let config = StreamProcessorConfig::default();
        assert_eq!(config.allowed_lateness_ms, None);
        assert!(config.notify_capacity > 0);
    }

    #[test]
    fn from_core_copies_lateness() {
        let core = tideway_core::config::ProcessorConfig {
            allowed_lateness_ms: Some(5_000),
        };
        assert_eq!(
            StreamProcessorConfig::from_core(&core).allowed_lateness_ms,
            Some(5_000)
        );
    }
}

//! CEP 엔진 설정
//!
//! [`EngineConfig`]는 core의 [`CepConfig`](tideway_core::config::CepConfig)를
//! 기반으로 엔진 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use tideway_core::config::TidewayConfig;
//! use tideway_cep::EngineConfig;
//!
//! let core_config = TidewayConfig::default();
//! let config = EngineConfig::from_core(&core_config.cep);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CepError;

/// CEP 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 이벤트 버퍼 최대 크기
    pub max_buffer_size: usize,
    /// conjunction/disjunction 기본 윈도우 (밀리초)
    pub default_within_ms: u64,
    /// 이상 탐지 컨텍스트 윈도우 기본 크기
    pub anomaly_window_size: usize,
    /// z-score 기본 임계값
    pub zscore_threshold: f64,
    /// 이상치 휴리스틱 기본 민감도
    pub outlier_sensitivity: f64,
    /// 알림 채널 용량
    pub notify_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_core(&tideway_core::config::CepConfig::default())
    }
}

impl EngineConfig {
    /// core의 `CepConfig`에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &tideway_core::config::CepConfig) -> Self {
        Self {
            max_buffer_size: core.max_buffer_size,
            default_within_ms: core.default_within_ms,
            anomaly_window_size: core.anomaly_window_size,
            zscore_threshold: core.zscore_threshold,
            outlier_sensitivity: core.outlier_sensitivity,
            notify_capacity: tideway_core::notify::DEFAULT_NOTIFY_CAPACITY,
        }
    }

    /// 버퍼 크기를 지정합니다.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CepError> {
        if self.max_buffer_size == 0 {
            return Err(CepError::Config {
                field: "max_buffer_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.default_within_ms == 0 {
            return Err(CepError::Config {
                field: "default_within_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if !(self.zscore_threshold > 0.0) || !(self.outlier_sensitivity > 0.0) {
            return Err(CepError::Config {
                field: "zscore_threshold/outlier_sensitivity".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

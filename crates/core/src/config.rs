//! 설정 관리: tideway.toml 파싱 및 런타임 설정
//!
//! [`TidewayConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`TIDEWAY_CEP_MAX_BUFFER_SIZE=5000` 형식)
//! 2. 설정 파일 (`tideway.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tideway_core::error::TidewayError> {
//! use tideway_core::config::TidewayConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TidewayConfig::load("tideway.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TidewayConfig::parse("[cep]\nmax_buffer_size = 500")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TidewayError};

/// Tideway 통합 설정
///
/// `tideway.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidewayConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// CEP 엔진 설정
    #[serde(default)]
    pub cep: CepConfig,
    /// 스트림 프로세서 설정
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// 스트림 조인 설정
    #[serde(default)]
    pub join: JoinConfig,
    /// 커넥터 설정
    #[serde(default)]
    pub connector: ConnectorConfig,
}

impl TidewayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TidewayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TidewayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TidewayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TidewayError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TidewayError> {
        toml::from_str(toml_str).map_err(|e| {
            TidewayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TIDEWAY_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TIDEWAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TIDEWAY_GENERAL_LOG_FORMAT");

        // CEP
        override_usize(&mut self.cep.max_buffer_size, "TIDEWAY_CEP_MAX_BUFFER_SIZE");
        override_u64(
            &mut self.cep.default_within_ms,
            "TIDEWAY_CEP_DEFAULT_WITHIN_MS",
        );
        override_usize(
            &mut self.cep.anomaly_window_size,
            "TIDEWAY_CEP_ANOMALY_WINDOW_SIZE",
        );
        override_f64(
            &mut self.cep.zscore_threshold,
            "TIDEWAY_CEP_ZSCORE_THRESHOLD",
        );
        override_f64(
            &mut self.cep.outlier_sensitivity,
            "TIDEWAY_CEP_OUTLIER_SENSITIVITY",
        );

        // Processor
        override_opt_u64(
            &mut self.processor.allowed_lateness_ms,
            "TIDEWAY_PROCESSOR_ALLOWED_LATENESS_MS",
        );

        // Join
        override_u64(&mut self.join.window_ms, "TIDEWAY_JOIN_WINDOW_MS");

        // Connector
        override_string(&mut self.connector.platform, "TIDEWAY_CONNECTOR_PLATFORM");
        override_string(&mut self.connector.endpoint, "TIDEWAY_CONNECTOR_ENDPOINT");
        override_string(&mut self.connector.topic, "TIDEWAY_CONNECTOR_TOPIC");
        override_u64(
            &mut self.connector.reconnect_base_delay_ms,
            "TIDEWAY_CONNECTOR_RECONNECT_BASE_DELAY_MS",
        );
        override_u32(
            &mut self.connector.max_reconnect_attempts,
            "TIDEWAY_CONNECTOR_MAX_RECONNECT_ATTEMPTS",
        );
        override_u64(
            &mut self.connector.metrics_interval_ms,
            "TIDEWAY_CONNECTOR_METRICS_INTERVAL_MS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TidewayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.cep.max_buffer_size == 0 {
            return Err(invalid("cep.max_buffer_size", "must be greater than 0"));
        }
        if self.cep.default_within_ms == 0 {
            return Err(invalid("cep.default_within_ms", "must be greater than 0"));
        }
        if !(self.cep.zscore_threshold > 0.0) {
            return Err(invalid("cep.zscore_threshold", "must be positive"));
        }
        if !(self.cep.outlier_sensitivity > 0.0) {
            return Err(invalid("cep.outlier_sensitivity", "must be positive"));
        }

        if self.join.window_ms == 0 {
            return Err(invalid("join.window_ms", "must be greater than 0"));
        }

        let valid_platforms = [
            "kafka",
            "pulsar",
            "kinesis",
            "rabbitmq",
            "redis",
            "nats",
            "eventhubs",
        ];
        if !valid_platforms.contains(&self.connector.platform.as_str()) {
            return Err(invalid(
                "connector.platform",
                format!("must be one of: {}", valid_platforms.join(", ")),
            ));
        }
        if self.connector.reconnect_base_delay_ms == 0 {
            return Err(invalid(
                "connector.reconnect_base_delay_ms",
                "must be greater than 0",
            ));
        }
        if self.connector.metrics_interval_ms == 0 {
            return Err(invalid(
                "connector.metrics_interval_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TidewayError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// CEP 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CepConfig {
    /// 이벤트 버퍼 최대 크기 (초과 시 오래된 이벤트부터 제거)
    pub max_buffer_size: usize,
    /// 시간 제약이 없는 conjunction/disjunction 패턴의 기본 윈도우 (밀리초)
    pub default_within_ms: u64,
    /// 이상 탐지 컨텍스트 윈도우 크기 (이벤트 수)
    pub anomaly_window_size: usize,
    /// z-score 기본 임계값
    pub zscore_threshold: f64,
    /// 이상치 휴리스틱 기본 민감도
    pub outlier_sensitivity: f64,
}

impl Default for CepConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 10_000,
            default_within_ms: 60_000,
            anomaly_window_size: 10,
            zscore_threshold: 3.0,
            outlier_sensitivity: 5.0,
        }
    }
}

/// 스트림 프로세서 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// 기본 허용 지연 (밀리초). 지정하지 않으면 배치마다 모든 윈도우를 닫습니다.
    pub allowed_lateness_ms: Option<u64>,
}

/// 스트림 조인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// 기본 조인 윈도우 크기 (밀리초)
    pub window_ms: u64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { window_ms: 60_000 }
    }
}

/// 커넥터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// 플랫폼 (kafka, pulsar, kinesis, rabbitmq, redis, nats, eventhubs)
    pub platform: String,
    /// 접속 주소
    pub endpoint: String,
    /// 토픽/스트림/큐 이름
    pub topic: String,
    /// 재연결 기본 지연 (밀리초)
    pub reconnect_base_delay_ms: u64,
    /// 최대 재연결 시도 횟수
    pub max_reconnect_attempts: u32,
    /// 처리량 메트릭 샘플링 간격 (밀리초)
    pub metrics_interval_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            platform: "kafka".to_owned(),
            endpoint: "localhost:9092".to_owned(),
            topic: "events".to_owned(),
            reconnect_base_delay_ms: 1_000,
            max_reconnect_attempts: 10,
            metrics_interval_ms: 1_000,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f64(target: &mut f64, env_key: &str) {
    override_parsed(target, env_key, "f64");
}

fn override_opt_u64(target: &mut Option<u64>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        if val.is_empty() {
            *target = None;
            return;
        }
        match val.parse::<u64>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

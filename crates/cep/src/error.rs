//! CEP 엔진 에러 타입
//!
//! [`CepError`]는 패턴 등록, 조건 평가, 이상 탐지 설정에서 발생하는 에러를 표현합니다.
//! `From<CepError> for TidewayError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use tideway_core::error::TidewayError;

/// CEP 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CepError {
    /// 패턴 유효성 검증 실패
    #[error("pattern validation error: pattern '{pattern_id}': {reason}")]
    PatternValidation {
        /// 문제가 된 패턴 ID
        pattern_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 조건 평가 중 에러 (컴파일되지 않은 정규식 등)
    #[error("condition match error: {0}")]
    ConditionMatch(String),

    /// 이상 탐지 설정 에러
    #[error("invalid anomaly config: {0}")]
    InvalidAnomalyConfig(String),

    /// 엔진 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<CepError> for TidewayError {
    fn from(err: CepError) -> Self {
        TidewayError::Detection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_validation_display() {
        let err = CepError::PatternValidation {
            pattern_id: "login-burst".to_owned(),
            reason: "at least one condition is required".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("login-burst"));
        assert!(msg.contains("at least one condition"));
    }

    #[test]
    fn converts_to_tideway_error() {
        let err = CepError::InvalidAnomalyConfig("custom detector missing".to_owned());
        let converted: TidewayError = err.into();
        assert!(matches!(converted, TidewayError::Detection(_)));
    }
}

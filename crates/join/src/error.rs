//! 조인 에러 타입

use tideway_core::error::TidewayError;

/// 조인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// 조인 설정 오류
    #[error("invalid join config: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl JoinError {
    pub(crate) fn config(field: &str, reason: &str) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

impl From<JoinError> for TidewayError {
    fn from(err: JoinError) -> Self {
        TidewayError::Processing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_processing_error() {
        let err: TidewayError = JoinError::config("left_key", "must not be empty").into();
        assert!(matches!(err, TidewayError::Processing(_)));
        assert!(err.to_string().contains("left_key"));
    }
}

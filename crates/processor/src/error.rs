//! 프로세서 에러 타입
//!
//! [`ProcessorError`]는 윈도우, 집계, 변환, 표현식 평가에서 발생하는 에러를 표현합니다.
//! `From<ProcessorError> for TidewayError` 변환으로 상위 레이어에 전파됩니다.

use tideway_core::error::{StorageError, TidewayError};

/// 프로세서 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// 윈도우 설정 에러
    #[error("invalid window config: {0}")]
    WindowConfig(String),

    /// 집계 설정 에러
    #[error("invalid aggregation: {0}")]
    Aggregation(String),

    /// 숫자 집계 대상 필드가 숫자가 아님
    #[error("field '{field}' in window '{window_id}' is not numeric: {value}")]
    NonNumericField {
        /// 필드 경로
        field: String,
        /// 윈도우 ID
        window_id: String,
        /// 실제 값
        value: String,
    },

    /// 변환 에러
    #[error("transform error: {0}")]
    Transform(String),

    /// 표현식 파싱/평가 에러
    #[error("expression error: {0}")]
    Expression(String),

    /// 상태 저장소 에러
    #[error("state store: {0}")]
    Storage(#[from] StorageError),
}

impl From<ProcessorError> for TidewayError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Storage(e) => TidewayError::Storage(e),
            other => TidewayError::Processing(other.to_string()),
        }
    }
}

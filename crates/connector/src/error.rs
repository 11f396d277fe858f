//! 커넥터 에러 타입
//!
//! [`ConnectorError`]는 `From<ConnectorError> for TidewayError`로 변환되며,
//! 코덱 에러는 core의 `CodecError`를 그대로 유지합니다.

use tideway_core::error::{CodecError, TidewayError};

/// 커넥터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// 지원하지 않는 플랫폼 이름
    #[error("unknown platform: '{0}'")]
    UnknownPlatform(String),

    /// 설정 오류
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 어댑터 연결 실패
    #[error("connection failed ({platform}): {reason}")]
    Connection {
        /// 플랫폼 이름
        platform: String,
        /// 실패 사유
        reason: String,
    },

    /// 연결되지 않은 상태에서 호출
    #[error("connector is not connected")]
    NotConnected,

    /// 재연결 한도 초과
    #[error("gave up after {attempts} reconnect attempts")]
    MaxReconnectAttempts {
        /// 시도한 재연결 횟수
        attempts: u32,
    },

    /// 레코드 수신 실패
    #[error("consume failed: {0}")]
    Consume(String),

    /// 레코드 전송 실패
    #[error("produce failed: {0}")]
    Produce(String),

    /// 소비 핸들러 실패
    #[error("handler failed: {0}")]
    Handler(String),

    /// 이벤트 인코딩/디코딩 실패
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<ConnectorError> for TidewayError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Codec(e) => TidewayError::Codec(e),
            other => TidewayError::Connector(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        let err = ConnectorError::Connection {
            platform: "kafka".to_owned(),
            reason: "broker unreachable".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "connection failed (kafka): broker unreachable"
        );
    }

    #[test]
    fn codec_error_keeps_kind() {
        let err: TidewayError = ConnectorError::Codec(CodecError::Decode("bad".to_owned())).into();
        assert!(matches!(err, TidewayError::Codec(_)));
    }

    #[test]
    fn other_errors_become_connector() {
        let err: TidewayError = ConnectorError::NotConnected.into();
        assert!(matches!(err, TidewayError::Connector(_)));
    }
}

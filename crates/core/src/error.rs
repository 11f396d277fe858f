//! 에러 타입: 도메인별 에러 정의

/// Tideway 최상위 에러 타입
///
/// 각 크레이트의 도메인 에러(`CepError`, `ProcessorError` 등)는
/// `From` 변환을 통해 이 타입으로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum TidewayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 이벤트 인코딩/디코딩 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// 상태 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 탐지 엔진 에러
    #[error("detection error: {0}")]
    Detection(String),

    /// 스트림 처리 에러 (윈도우, 집계, 변환, 조인)
    #[error("processing error: {0}")]
    Processing(String),

    /// 커넥터 에러
    #[error("connector error: {0}")]
    Connector(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 이벤트 직렬화 에러
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 인코딩 실패
    #[error("encode failed: {0}")]
    Encode(String),

    /// 디코딩 실패
    #[error("decode failed: {0}")]
    Decode(String),
}

/// 상태 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 저장소 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 읽기/쓰기 실패
    #[error("operation failed: {0}")]
    Operation(String),
}

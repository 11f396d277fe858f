//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tideway_`
//! - 컴포넌트명: `cep_`, `processor_`, `join_`, `connector_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tideway_core::metrics::CEP_EVENTS_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 패턴 유형 레이블 키 (sequence, conjunction, ...)
pub const LABEL_PATTERN_TYPE: &str = "pattern_type";

/// 이상 탐지 방식 레이블 키 (zscore, iqr, isolation_forest, custom)
pub const LABEL_METHOD: &str = "method";

/// 조인 유형 레이블 키 (inner, left, right, full)
pub const LABEL_JOIN_TYPE: &str = "join_type";

/// 플랫폼 레이블 키 (kafka, pulsar, ...)
pub const LABEL_PLATFORM: &str = "platform";

// ─── CEP 메트릭 ────────────────────────────────────────────────────

/// CEP: 처리된 이벤트 수 (counter)
pub const CEP_EVENTS_PROCESSED_TOTAL: &str = "tideway_cep_events_processed_total";

/// CEP: 버퍼 오버플로우로 제거된 이벤트 수 (counter)
pub const CEP_EVENTS_DROPPED_TOTAL: &str = "tideway_cep_events_dropped_total";

/// CEP: 버퍼 내 이벤트 수 (gauge)
pub const CEP_BUFFER_SIZE: &str = "tideway_cep_buffer_size";

/// CEP: 등록된 패턴 수 (gauge)
pub const CEP_PATTERNS_REGISTERED: &str = "tideway_cep_patterns_registered";

/// CEP: 패턴 매칭 수 (counter, label: pattern_type)
pub const CEP_PATTERN_MATCHES_TOTAL: &str = "tideway_cep_pattern_matches_total";

/// CEP: 탐지된 이상 수 (counter, label: method)
pub const CEP_ANOMALIES_TOTAL: &str = "tideway_cep_anomalies_total";

// ─── Processor 메트릭 ──────────────────────────────────────────────

/// Processor: 현재 워터마크 (gauge, Unix epoch 밀리초)
pub const PROCESSOR_WATERMARK: &str = "tideway_processor_watermark";

/// Processor: 열린 윈도우 수 (gauge)
pub const PROCESSOR_OPEN_WINDOWS: &str = "tideway_processor_open_windows";

/// Processor: 닫힌 윈도우 수 (counter)
pub const PROCESSOR_WINDOWS_CLOSED_TOTAL: &str = "tideway_processor_windows_closed_total";

/// Processor: 늦게 도착해 버려진 이벤트 수 (counter)
pub const PROCESSOR_LATE_EVENTS_TOTAL: &str = "tideway_processor_late_events_total";

// ─── Join 메트릭 ───────────────────────────────────────────────────

/// Join: 생성된 조인 결과 수 (counter, label: join_type)
pub const JOIN_RESULTS_TOTAL: &str = "tideway_join_results_total";

/// Join: 버퍼링된 이벤트 수 (gauge)
pub const JOIN_BUFFERED_EVENTS: &str = "tideway_join_buffered_events";

/// Join: 만료로 제거된 이벤트 수 (counter)
pub const JOIN_EVICTED_TOTAL: &str = "tideway_join_evicted_total";

// ─── Connector 메트릭 ──────────────────────────────────────────────

/// Connector: 수신 레코드 수 (counter, label: platform)
pub const CONNECTOR_RECORDS_IN_TOTAL: &str = "tideway_connector_records_in_total";

/// Connector: 송신 레코드 수 (counter, label: platform)
pub const CONNECTOR_RECORDS_OUT_TOTAL: &str = "tideway_connector_records_out_total";

/// Connector: 초당 이벤트 처리량 (gauge, label: platform)
pub const CONNECTOR_EVENTS_PER_SECOND: &str = "tideway_connector_events_per_second";

/// Connector: 재연결 시도 수 (counter, label: platform)
pub const CONNECTOR_RECONNECT_ATTEMPTS_TOTAL: &str =
    "tideway_connector_reconnect_attempts_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // CEP
    describe_counter!(
        CEP_EVENTS_PROCESSED_TOTAL,
        "Total number of events ingested by the CEP engine"
    );
    describe_counter!(
        CEP_EVENTS_DROPPED_TOTAL,
        "Total number of events evicted from the CEP buffer on overflow"
    );
    describe_gauge!(CEP_BUFFER_SIZE, "Current number of events in the CEP buffer");
    describe_gauge!(
        CEP_PATTERNS_REGISTERED,
        "Number of patterns currently registered"
    );
    describe_counter!(
        CEP_PATTERN_MATCHES_TOTAL,
        "Total number of pattern matches by pattern type"
    );
    describe_counter!(
        CEP_ANOMALIES_TOTAL,
        "Total number of anomalies by detection method"
    );

    // Processor
    describe_gauge!(
        PROCESSOR_WATERMARK,
        "Current event-time watermark in epoch milliseconds"
    );
    describe_gauge!(PROCESSOR_OPEN_WINDOWS, "Number of windows currently open");
    describe_counter!(
        PROCESSOR_WINDOWS_CLOSED_TOTAL,
        "Total number of windows closed"
    );
    describe_counter!(
        PROCESSOR_LATE_EVENTS_TOTAL,
        "Total number of events dropped because their window was already closed"
    );

    // Join
    describe_counter!(JOIN_RESULTS_TOTAL, "Total number of joined records emitted");
    describe_gauge!(
        JOIN_BUFFERED_EVENTS,
        "Number of events currently held in join buffers"
    );
    describe_counter!(
        JOIN_EVICTED_TOTAL,
        "Total number of events evicted from join buffers by age"
    );

    // Connector
    describe_counter!(
        CONNECTOR_RECORDS_IN_TOTAL,
        "Total number of records consumed from the platform"
    );
    describe_counter!(
        CONNECTOR_RECORDS_OUT_TOTAL,
        "Total number of records produced to the platform"
    );
    describe_gauge!(
        CONNECTOR_EVENTS_PER_SECOND,
        "Rolling average of consumed events per second"
    );
    describe_counter!(
        CONNECTOR_RECONNECT_ATTEMPTS_TOTAL,
        "Total number of reconnect attempts"
    );
}

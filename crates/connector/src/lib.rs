#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`connector`]: 연결 수명, 재연결, 소비/전송 코디네이터
//! - [`adapter`]: 플랫폼 어댑터 trait과 팩토리
//! - [`memory`]: tokio 채널 기반 메모리 어댑터
//! - [`platform`]: 지원 플랫폼 열거형
//! - [`throughput`]: 처리량 카운터와 롤링 샘플러
//! - [`config`]: 커넥터 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod adapter;
pub mod config;
pub mod connector;
pub mod error;
pub mod memory;
pub mod platform;
pub mod throughput;

// --- 주요 타입 re-export ---

// 커넥터
pub use connector::{ConnectionState, Connector, ConnectorNotification};

// 어댑터
pub use adapter::{AdapterFactory, PlatformAdapter};
pub use memory::{MemoryAdapter, MemoryAdapterFactory, MemoryEndpoint, memory_channel};

// 설정
pub use config::{ConnectionSettings, ConnectorSettings};

// 에러
pub use error::ConnectorError;

// 플랫폼
pub use platform::Platform;

// 메트릭
pub use throughput::ThroughputMetrics;

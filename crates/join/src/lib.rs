#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`joiner`]: 시간 윈도우 스트림-스트림 조인과 버퍼 정리
//! - [`enrich`]: 메모리 테이블 조회 보강
//! - [`config`]: 조인 유형과 설정
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod enrich;
pub mod error;
pub mod joiner;

// --- 주요 타입 re-export ---

// 조이너
pub use joiner::{Clock, JoinedEvent, StreamJoiner};

// 설정
pub use config::{JoinConfig, JoinType, StreamJoinerConfig};

// 에러
pub use error::JoinError;

// 보강
pub use enrich::{EnrichedEvent, enrich_stream};

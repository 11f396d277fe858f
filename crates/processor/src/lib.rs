#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`processor`]: 윈도우 상태와 워터마크를 보유한 스트림 프로세서
//! - [`window`]: 윈도우 유형과 할당 규칙
//! - [`aggregate`]: 윈도우 집계 (그룹, having 필터)
//! - [`transform`]: map / flat_map / filter / reduce / fold 변환
//! - [`expr`]: 변환용 안전한 표현식 인터프리터
//! - [`config`]: 프로세서 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod aggregate;
pub mod config;
pub mod error;
pub mod expr;
pub mod processor;
pub mod transform;
pub mod window;

// --- 주요 타입 re-export ---

// 프로세서
pub use processor::{ProcessorNotification, StreamProcessor};

// 설정
pub use config::StreamProcessorConfig;

// 에러
pub use error::ProcessorError;

// 윈도우
pub use window::{Window, WindowConfig, WindowType};

// 집계
pub use aggregate::{
    AggregationConfig, AggregationMetadata, AggregationResult, AggregationType, GroupAggregate,
    aggregate,
};

// 변환
pub use transform::{Transform, TransformOutput, apply_transform};

// 표현식
pub use expr::Expression;

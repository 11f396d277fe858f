#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pattern`]: 패턴 타입, 빌더, 조건 매처 (정규식 캐싱)
//! - [`engine`]: 패턴 레지스트리와 배치 평가 코디네이터
//! - [`buffer`]: FIFO 상한 이벤트 버퍼
//! - [`anomaly`]: 통계 기반 이상 탐지
//! - [`correlation`]: 필드 튜플 기반 이벤트 그룹화
//! - [`config`]: 엔진 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod anomaly;
pub mod buffer;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod pattern;

mod detect;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{CepEngine, CepNotification, PatternMatch};

// 설정
pub use config::EngineConfig;

// 에러
pub use error::CepError;

// 패턴
pub use pattern::{
    CepPattern, Condition, ConditionOperator, PatternBuilder, PatternType, Quantifier,
    TimeConstraint,
};

// 이상 탐지
pub use anomaly::{Anomaly, AnomalyConfig, AnomalyMethod};

// 상관 분석
pub use correlation::correlate_events;

// 버퍼
pub use buffer::EventBuffer;

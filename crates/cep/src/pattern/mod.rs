//! 패턴 정의 -- 타입, 빌더, 조건 매처
//!
//! - [`types`]: 패턴/조건/수량자 데이터 구조
//! - [`builder`]: 코드에서 패턴을 조립하는 [`PatternBuilder`]
//! - [`matcher`]: 조건 평가와 정규식 캐싱을 담당하는 [`ConditionMatcher`]

pub mod builder;
pub mod matcher;
pub mod types;

pub use builder::PatternBuilder;
pub use matcher::ConditionMatcher;
pub use types::{
    CepPattern, Condition, ConditionOperator, EventPredicate, PatternType, Quantifier,
    TimeConstraint,
};

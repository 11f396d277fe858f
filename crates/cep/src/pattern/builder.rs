//! 패턴 빌더
//!
//! ```ignore
//! let pattern = PatternBuilder::sequence("login-then-transfer")
//!     .condition(Condition::eq("type", "login"))
//!     .condition(Condition::eq("type", "transfer"))
//!     .within(5_000)
//!     .build()?;
//! ```

use super::types::{CepPattern, Condition, PatternType, Quantifier, TimeConstraint};
use crate::error::CepError;

/// [`CepPattern`] 빌더
#[derive(Debug, Clone, Default)]
pub struct PatternBuilder {
    id: String,
    pattern_type: Option<PatternType>,
    conditions: Vec<Condition>,
    within_ms: Option<u64>,
    quantifier: Option<Quantifier>,
}

impl PatternBuilder {
    /// 유형 없이 빌더를 생성합니다. `build()` 전에 유형을 지정해야 합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// sequence 패턴 빌더
    pub fn sequence(id: impl Into<String>) -> Self {
        Self::new(id).pattern_type(PatternType::Sequence)
    }

    /// conjunction 패턴 빌더
    pub fn conjunction(id: impl Into<String>) -> Self {
        Self::new(id).pattern_type(PatternType::Conjunction)
    }

    /// disjunction 패턴 빌더
    pub fn disjunction(id: impl Into<String>) -> Self {
        Self::new(id).pattern_type(PatternType::Disjunction)
    }

    /// negation 패턴 빌더
    pub fn negation(id: impl Into<String>) -> Self {
        Self::new(id).pattern_type(PatternType::Negation)
    }

    /// iteration 패턴 빌더
    pub fn iteration(id: impl Into<String>) -> Self {
        Self::new(id).pattern_type(PatternType::Iteration)
    }

    /// 패턴 유형을 지정합니다.
    pub fn pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = Some(pattern_type);
        self
    }

    /// 조건을 추가합니다.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// negation 패턴의 부재 조건을 추가합니다.
    pub fn absent(mut self, condition: Condition) -> Self {
        self.conditions.push(condition.negate());
        self
    }

    /// 시간 제약을 지정합니다 (밀리초).
    pub fn within(mut self, within_ms: u64) -> Self {
        self.within_ms = Some(within_ms);
        self
    }

    /// 반복 수량자를 지정합니다.
    pub fn quantifier(mut self, quantifier: Quantifier) -> Self {
        self.quantifier = Some(quantifier);
        self
    }

    /// 패턴을 생성하고 유효성을 검증합니다.
    pub fn build(self) -> Result<CepPattern, CepError> {
        let pattern_type = self.pattern_type.ok_or_else(|| CepError::PatternValidation {
            pattern_id: self.id.clone(),
            reason: "pattern type is required".to_owned(),
        })?;

        let pattern = CepPattern {
            id: self.id,
            pattern_type,
            conditions: self.conditions,
            time_constraint: self.within_ms.map(|within_ms| TimeConstraint { within_ms }),
            quantifier: self.quantifier,
        };
        pattern.validate()?;
        Ok(pattern)
    }
}

//! 패턴 데이터 타입
//!
//! 패턴은 직렬화 가능한 선언적 조건과, 코드에서만 만들 수 있는
//! 네이티브 술어 조건을 함께 지원합니다.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tideway_core::event::StreamEvent;

use crate::error::CepError;

/// 패턴 ID 최대 길이
const MAX_PATTERN_ID_LEN: usize = 256;

/// 이벤트 술어 (네이티브 조건)
pub type EventPredicate = Arc<dyn Fn(&StreamEvent) -> bool + Send + Sync>;

/// 패턴 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// 조건이 선언 순서대로 시간 제약 안에 발생
    Sequence,
    /// 시간 버킷 안에서 모든 조건이 서로 다른 이벤트로 충족
    Conjunction,
    /// 시간 버킷 안에서 조건 중 하나라도 충족
    Disjunction,
    /// 양성 이벤트 이후 시간 제약 안에 부정 조건 이벤트가 없음
    Negation,
    /// 첫 조건을 연속으로 반복 충족
    Iteration,
    /// sequence와 동일한 의미
    Temporal,
}

impl PatternType {
    /// 메트릭 레이블 등에 사용하는 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Conjunction => "conjunction",
            Self::Disjunction => "disjunction",
            Self::Negation => "negation",
            Self::Iteration => "iteration",
            Self::Temporal => "temporal",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 조건 연산자
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// 값 동일 (숫자는 수치 비교)
    #[default]
    Eq,
    /// 값 불일치
    Ne,
    /// 초과
    Gt,
    /// 이상
    Gte,
    /// 미만
    Lt,
    /// 이하
    Lte,
    /// 부분 문자열 또는 배열 원소 포함
    Contains,
    /// 접두어 일치
    StartsWith,
    /// 접미어 일치
    EndsWith,
    /// 정규식 매칭
    Regex,
    /// 값이 주어진 배열의 원소
    In,
    /// 필드 존재 (null이 아님)
    Exists,
}

/// 이벤트 조건
///
/// `predicate`가 설정되면 선언적 필드 비교 대신 술어를 평가합니다.
/// `negated`는 negation 패턴에서 "발생하지 않아야 할" 조건을 표시하며,
/// 매칭 결과를 뒤집지는 않습니다.
#[derive(Clone, Serialize, Deserialize)]
pub struct Condition {
    /// 대상 필드 경로 (술어 조건은 설명용 레이블)
    pub field: String,
    /// 연산자
    #[serde(default)]
    pub operator: ConditionOperator,
    /// 비교 값
    #[serde(default)]
    pub value: Value,
    /// negation 패턴의 부재 조건 여부
    #[serde(default)]
    pub negated: bool,
    /// 네이티브 술어
    #[serde(skip)]
    pub predicate: Option<EventPredicate>,
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("field", &self.field)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("negated", &self.negated)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Condition {
    /// 선언적 조건을 생성합니다.
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            negated: false,
            predicate: None,
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Eq, value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Gt, value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Lt, value.into())
    }

    /// 부분 문자열 포함
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ConditionOperator::Contains, value.into())
    }

    /// 정규식 매칭
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, ConditionOperator::Regex, Value::String(pattern.into()))
    }

    /// 필드 존재
    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, ConditionOperator::Exists, Value::Null)
    }

    /// 네이티브 술어 조건을 생성합니다.
    pub fn predicate<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StreamEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            field: label.into(),
            operator: ConditionOperator::Eq,
            value: Value::Null,
            negated: false,
            predicate: Some(Arc::new(f)),
        }
    }

    /// negation 패턴의 부재 조건으로 표시합니다.
    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }
}

/// 시간 제약
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConstraint {
    /// 허용 시간 범위 (밀리초)
    pub within_ms: u64,
}

/// 반복 수량자
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantifier {
    /// 최소 반복 수
    #[serde(default)]
    pub min: Option<usize>,
    /// 최대 반복 수
    #[serde(default)]
    pub max: Option<usize>,
    /// 정확한 반복 수 (min/max보다 우선)
    #[serde(default)]
    pub exactly: Option<usize>,
}

impl Quantifier {
    /// 정확히 `n`회
    pub fn exactly(n: usize) -> Self {
        Self {
            exactly: Some(n),
            ..Self::default()
        }
    }

    /// `min`~`max`회
    pub fn range(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            exactly: None,
        }
    }

    /// 최소 `n`회
    pub fn at_least(n: usize) -> Self {
        Self {
            min: Some(n),
            ..Self::default()
        }
    }

    /// 필요한 최소 반복 수 (기본 1)
    pub fn required(&self) -> usize {
        self.exactly.or(self.min).unwrap_or(1)
    }

    /// 허용되는 최대 반복 수
    pub fn upper(&self) -> usize {
        self.exactly.or(self.max).unwrap_or(usize::MAX)
    }

    /// `count`가 수량자를 만족하는지 확인합니다.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required() && count <= self.upper()
    }
}

/// CEP 패턴
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CepPattern {
    /// 패턴 고유 ID
    pub id: String,
    /// 패턴 유형
    pub pattern_type: PatternType,
    /// 조건 목록 (선언 순서가 의미를 가짐)
    pub conditions: Vec<Condition>,
    /// 시간 제약
    #[serde(default)]
    pub time_constraint: Option<TimeConstraint>,
    /// 반복 수량자
    #[serde(default)]
    pub quantifier: Option<Quantifier>,
}

impl CepPattern {
    /// 패턴의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CepError> {
        let fail = |reason: &str| CepError::PatternValidation {
            pattern_id: if self.id.is_empty() {
                "(empty)".to_owned()
            } else {
                self.id.clone()
            },
            reason: reason.to_owned(),
        };

        if self.id.is_empty() {
            return Err(fail("pattern id must not be empty"));
        }
        if self.id.len() > MAX_PATTERN_ID_LEN {
            return Err(fail("pattern id must not exceed 256 characters"));
        }
        if self.conditions.is_empty() {
            return Err(fail("at least one condition is required"));
        }
        if let Some(tc) = self.time_constraint {
            if tc.within_ms == 0 {
                return Err(fail("time constraint must be greater than 0"));
            }
        }
        if let Some(q) = self.quantifier {
            if q.exactly == Some(0) {
                return Err(fail("quantifier exactly must be greater than 0"));
            }
            if let (Some(min), Some(max)) = (q.min, q.max) {
                if min > max {
                    return Err(fail("quantifier min must not exceed max"));
                }
            }
        }
        if self.pattern_type == PatternType::Negation {
            let negated = self.conditions.iter().filter(|c| c.negated).count();
            if negated == 0 || negated == self.conditions.len() {
                return Err(fail(
                    "negation requires at least one positive and one negated condition",
                ));
            }
        }
        for (idx, condition) in self.conditions.iter().enumerate() {
            if condition.predicate.is_none() && condition.field.is_empty() {
                return Err(fail(&format!("condition[{idx}] field must not be empty")));
            }
            if condition.predicate.is_none()
                && condition.operator == ConditionOperator::In
                && !condition.value.is_array()
            {
                return Err(fail(&format!(
                    "condition[{idx}] 'in' operator requires an array value"
                )));
            }
        }
        Ok(())
    }

    /// 시간 제약을 밀리초로 반환합니다.
    pub fn within_ms(&self) -> Option<u64> {
        self.time_constraint.map(|tc| tc.within_ms)
    }
}

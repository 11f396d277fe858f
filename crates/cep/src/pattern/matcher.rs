//! 조건 매칭 로직 -- 조건 평가 및 정규식 캐싱
//!
//! [`ConditionMatcher`]는 패턴의 조건을 [`StreamEvent`]에 대해 평가합니다.
//! 정규식은 패턴 등록 시 한 번만 컴파일하여 캐싱합니다.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use tideway_core::event::StreamEvent;

use super::types::{CepPattern, Condition, ConditionOperator};
use crate::error::CepError;

/// 조건 매처
pub struct ConditionMatcher {
    /// 컴파일된 정규식 캐시: (pattern_id, condition_index) -> Regex
    regex_cache: HashMap<(String, usize), Regex>,
}

impl ConditionMatcher {
    /// 새 매처를 생성합니다.
    pub fn new() -> Self {
        Self {
            regex_cache: HashMap::new(),
        }
    }

    /// 패턴의 정규식 조건을 미리 컴파일합니다.
    pub fn compile_pattern(&mut self, pattern: &CepPattern) -> Result<(), CepError> {
        let mut compiled = Vec::new();
        for (idx, condition) in pattern.conditions.iter().enumerate() {
            if condition.predicate.is_some() || condition.operator != ConditionOperator::Regex {
                continue;
            }
            let source = condition.value.as_str().ok_or_else(|| CepError::PatternValidation {
                pattern_id: pattern.id.clone(),
                reason: format!("condition[{idx}] regex value must be a string"),
            })?;
            let regex = Regex::new(source).map_err(|e| CepError::PatternValidation {
                pattern_id: pattern.id.clone(),
                reason: format!(
                    "invalid regex in condition[{idx}] for field '{}': {e}",
                    condition.field
                ),
            })?;
            compiled.push((idx, regex));
        }

        // 전부 컴파일된 뒤에만 교체
        self.remove_pattern(&pattern.id);
        for (idx, regex) in compiled {
            self.regex_cache.insert((pattern.id.clone(), idx), regex);
        }
        Ok(())
    }

    /// 패턴 제거 시 캐시를 정리합니다.
    pub fn remove_pattern(&mut self, pattern_id: &str) {
        self.regex_cache.retain(|(id, _), _| id != pattern_id);
    }

    /// 패턴의 `idx`번째 조건이 이벤트에 매칭되는지 평가합니다.
    pub fn matches(
        &self,
        pattern: &CepPattern,
        idx: usize,
        event: &StreamEvent,
    ) -> Result<bool, CepError> {
        let condition = pattern.conditions.get(idx).ok_or_else(|| {
            CepError::ConditionMatch(format!(
                "pattern '{}' has no condition[{idx}]",
                pattern.id
            ))
        })?;

        if let Some(ref predicate) = condition.predicate {
            return Ok(predicate(event));
        }

        let Some(actual) = event.field(&condition.field) else {
            return Ok(false);
        };

        if condition.operator == ConditionOperator::Regex {
            let regex = self
                .regex_cache
                .get(&(pattern.id.clone(), idx))
                .ok_or_else(|| {
                    CepError::ConditionMatch(format!(
                        "regex not compiled for pattern '{}' condition[{idx}]",
                        pattern.id
                    ))
                })?;
            return Ok(match actual.as_ref() {
                Value::String(s) => regex.is_match(s),
                Value::Null => false,
                other => regex.is_match(&other.to_string()),
            });
        }

        Ok(evaluate(condition, actual.as_ref()))
    }
}

impl Default for ConditionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// 정규식 외 연산자를 평가합니다.
fn evaluate(condition: &Condition, actual: &Value) -> bool {
    let expected = &condition.value;
    match condition.operator {
        ConditionOperator::Exists => !actual.is_null(),
        ConditionOperator::Eq => values_equal(actual, expected),
        ConditionOperator::Ne => !values_equal(actual, expected),
        ConditionOperator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        ConditionOperator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ConditionOperator::Lt => compare(actual, expected) == Some(Ordering::Less),
        ConditionOperator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConditionOperator::Contains => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.contains(e.as_str()),
            (Value::Array(items), e) => items.iter().any(|item| values_equal(item, e)),
            _ => false,
        },
        ConditionOperator::StartsWith => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.starts_with(e.as_str()),
            _ => false,
        },
        ConditionOperator::EndsWith => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.ends_with(e.as_str()),
            _ => false,
        },
        ConditionOperator::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(actual, item))),
        // compile_pattern에서 캐시되어 matches()가 먼저 처리
        ConditionOperator::Regex => false,
    }
}

/// 숫자는 수치로, 그 외는 JSON 동등성으로 비교합니다.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// 숫자끼리, 문자열끼리만 순서 비교가 가능합니다.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

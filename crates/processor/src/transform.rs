//! 이벤트 변환
//!
//! 각 변환은 네이티브 클로저나 표현식 문자열([`crate::expr`])로 지정합니다.
//! 표현식의 위치 인자는 `map`/`flat_map`/`filter`에서 `(event, index)`,
//! `reduce`/`fold`에서 `(acc, event, index)`입니다. `event`는 이벤트의 JSON 표현
//! (`id`, `key`, `value`, `timestamp`, `metadata`)입니다.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tideway_core::event::StreamEvent;

use crate::error::ProcessorError;
use crate::expr::{Expression, truthy};

/// map 함수
pub type MapFn = Arc<dyn Fn(&StreamEvent, usize) -> StreamEvent + Send + Sync>;
/// flat_map 함수
pub type FlatMapFn = Arc<dyn Fn(&StreamEvent, usize) -> Vec<StreamEvent> + Send + Sync>;
/// filter 함수
pub type FilterFn = Arc<dyn Fn(&StreamEvent, usize) -> bool + Send + Sync>;
/// reduce/fold 함수
pub type ReduceFn = Arc<dyn Fn(Value, &StreamEvent, usize) -> Value + Send + Sync>;

const EVENT_PARAMS: &[&str] = &["event", "index"];
const ACC_PARAMS: &[&str] = &["acc", "event", "index"];

/// 네이티브 클로저 또는 표현식 문자열
#[derive(Clone)]
pub enum Function<F> {
    /// 네이티브 클로저
    Native(F),
    /// 표현식 문자열
    Expr(String),
}

impl<F> fmt::Debug for Function<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(<fn>)"),
            Self::Expr(src) => write!(f, "Expr({src:?})"),
        }
    }
}

/// 변환 정의
#[derive(Debug, Clone)]
pub enum Transform {
    /// 이벤트마다 하나의 이벤트
    Map(Function<MapFn>),
    /// 이벤트마다 0개 이상의 이벤트
    FlatMap(Function<FlatMapFn>),
    /// 조건을 만족하는 이벤트만
    Filter(Function<FilterFn>),
    /// 누적 값 (초기값이 없으면 첫 이벤트의 `value`에서 시작)
    Reduce {
        /// 누적 함수
        function: Function<ReduceFn>,
        /// 초기값
        initial: Option<Value>,
    },
    /// 초기값이 필수인 누적
    Fold {
        /// 누적 함수
        function: Function<ReduceFn>,
        /// 초기값
        initial: Value,
    },
}

impl Transform {
    /// 네이티브 map
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&StreamEvent, usize) -> StreamEvent + Send + Sync + 'static,
    {
        Self::Map(Function::Native(Arc::new(f)))
    }

    /// 표현식 map. 결과가 새 이벤트의 `value`가 됩니다.
    pub fn map_expr(source: impl Into<String>) -> Self {
        Self::Map(Function::Expr(source.into()))
    }

    /// 네이티브 flat_map
    pub fn flat_map<F>(f: F) -> Self
    where
        F: Fn(&StreamEvent, usize) -> Vec<StreamEvent> + Send + Sync + 'static,
    {
        Self::FlatMap(Function::Native(Arc::new(f)))
    }

    /// 표현식 flat_map. 배열 결과의 각 원소가 이벤트가 됩니다.
    pub fn flat_map_expr(source: impl Into<String>) -> Self {
        Self::FlatMap(Function::Expr(source.into()))
    }

    /// 네이티브 filter
    pub fn filter<F>(f: F) -> Self
    where
        F: Fn(&StreamEvent, usize) -> bool + Send + Sync + 'static,
    {
        Self::Filter(Function::Native(Arc::new(f)))
    }

    /// 표현식 filter
    pub fn filter_expr(source: impl Into<String>) -> Self {
        Self::Filter(Function::Expr(source.into()))
    }

    /// 네이티브 reduce
    pub fn reduce<F>(f: F, initial: Option<Value>) -> Self
    where
        F: Fn(Value, &StreamEvent, usize) -> Value + Send + Sync + 'static,
    {
        Self::Reduce {
            function: Function::Native(Arc::new(f)),
            initial,
        }
    }

    /// 표현식 reduce
    pub fn reduce_expr(source: impl Into<String>, initial: Option<Value>) -> Self {
        Self::Reduce {
            function: Function::Expr(source.into()),
            initial,
        }
    }

    /// 네이티브 fold
    pub fn fold<F>(f: F, initial: Value) -> Self
    where
        F: Fn(Value, &StreamEvent, usize) -> Value + Send + Sync + 'static,
    {
        Self::Fold {
            function: Function::Native(Arc::new(f)),
            initial,
        }
    }

    /// 표현식 fold
    pub fn fold_expr(source: impl Into<String>, initial: Value) -> Self {
        Self::Fold {
            function: Function::Expr(source.into()),
            initial,
        }
    }

    /// 변환 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Map(_) => "map",
            Self::FlatMap(_) => "flat_map",
            Self::Filter(_) => "filter",
            Self::Reduce { .. } => "reduce",
            Self::Fold { .. } => "fold",
        }
    }
}

/// 변환 결과
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    /// map, flat_map, filter 결과
    Events(Vec<StreamEvent>),
    /// reduce, fold 결과
    Value(Value),
}

impl TransformOutput {
    /// 이벤트 결과를 꺼냅니다.
    pub fn into_events(self) -> Option<Vec<StreamEvent>> {
        match self {
            Self::Events(events) => Some(events),
            Self::Value(_) => None,
        }
    }

    /// 값 결과를 꺼냅니다.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Events(_) => None,
        }
    }
}

/// 이벤트 목록에 변환을 적용합니다.
pub fn apply_transform(
    events: &[StreamEvent],
    transform: &Transform,
) -> Result<TransformOutput, ProcessorError> {
    match transform {
        Transform::Map(function) => {
            let mut out = Vec::with_capacity(events.len());
            match function {
                Function::Native(f) => {
                    out.extend(events.iter().enumerate().map(|(i, e)| f(e, i)));
                }
                Function::Expr(src) => {
                    let expr = Expression::parse(src, EVENT_PARAMS)?;
                    for (i, e) in events.iter().enumerate() {
                        let value = expr.eval(&[event_json(e)?, Value::from(i)])?;
                        out.push(derive_event(e, value, false));
                    }
                }
            }
            Ok(TransformOutput::Events(out))
        }
        Transform::FlatMap(function) => {
            let mut out = Vec::new();
            match function {
                Function::Native(f) => {
                    for (i, e) in events.iter().enumerate() {
                        out.extend(f(e, i));
                    }
                }
                Function::Expr(src) => {
                    let expr = Expression::parse(src, EVENT_PARAMS)?;
                    for (i, e) in events.iter().enumerate() {
                        match expr.eval(&[event_json(e)?, Value::from(i)])? {
                            Value::Array(items) => {
                                out.extend(items.into_iter().map(|v| derive_event(e, v, true)));
                            }
                            Value::Null => {}
                            single => out.push(derive_event(e, single, false)),
                        }
                    }
                }
            }
            Ok(TransformOutput::Events(out))
        }
        Transform::Filter(function) => {
            let mut out = Vec::new();
            match function {
                Function::Native(f) => {
                    out.extend(
                        events
                            .iter()
                            .enumerate()
                            .filter(|&(i, e)| f(e, i))
                            .map(|(_, e)| e.clone()),
                    );
                }
                Function::Expr(src) => {
                    let expr = Expression::parse(src, EVENT_PARAMS)?;
                    for (i, e) in events.iter().enumerate() {
                        if truthy(&expr.eval(&[event_json(e)?, Value::from(i)])?) {
                            out.push(e.clone());
                        }
                    }
                }
            }
            Ok(TransformOutput::Events(out))
        }
        Transform::Reduce { function, initial } => {
            let (acc, rest_from) = match initial {
                Some(v) => (v.clone(), 0),
                None => {
                    let first = events.first().ok_or_else(|| {
                        ProcessorError::Transform(
                            "reduce of empty input with no initial value".to_owned(),
                        )
                    })?;
                    (first.value.clone(), 1)
                }
            };
            accumulate(function, acc, events, rest_from).map(TransformOutput::Value)
        }
        Transform::Fold { function, initial } => {
            accumulate(function, initial.clone(), events, 0).map(TransformOutput::Value)
        }
    }
}

fn accumulate(
    function: &Function<ReduceFn>,
    mut acc: Value,
    events: &[StreamEvent],
    from: usize,
) -> Result<Value, ProcessorError> {
    let rest = events.iter().enumerate().skip(from);
    match function {
        Function::Native(f) => {
            for (i, e) in rest {
                acc = f(acc, e, i);
            }
        }
        Function::Expr(src) => {
            let expr = Expression::parse(src, ACC_PARAMS)?;
            for (i, e) in rest {
                acc = expr.eval(&[acc, event_json(e)?, Value::from(i)])?;
            }
        }
    }
    Ok(acc)
}

fn event_json(event: &StreamEvent) -> Result<Value, ProcessorError> {
    serde_json::to_value(event)
        .map_err(|e| ProcessorError::Transform(format!("failed to encode event: {e}")))
}

/// 원본의 키, 타임스탬프, 메타데이터를 유지한 새 이벤트
fn derive_event(source: &StreamEvent, value: Value, fresh_id: bool) -> StreamEvent {
    let mut event = source.clone();
    event.value = value;
    if fresh_id {
        event.id = uuid::Uuid::new_v4().to_string();
    }
    event
}

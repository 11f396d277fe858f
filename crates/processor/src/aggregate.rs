//! 윈도우 집계
//!
//! 닫힌 윈도우만 집계합니다. `group_by` 필드가 없으면 윈도우 전체가
//! `"*"` 그룹 하나가 됩니다.
//!
//! 숫자 집계(sum, avg, min, max, percentile, stddev, variance)에서 대상 필드가
//! 없는 이벤트는 건너뛰고, 필드가 있지만 숫자가 아니면 에러입니다.
//! 분산과 표준편차는 모집단 기준입니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tideway_core::event::StreamEvent;

use crate::error::ProcessorError;
use crate::expr::number;
use crate::window::Window;

/// 그룹 키가 없을 때의 그룹 이름
pub const ALL_GROUP: &str = "*";

/// 사용자 정의 집계 함수
pub type CustomAggregator = Arc<dyn Fn(&[StreamEvent]) -> Value + Send + Sync>;

/// 그룹 필터
pub type HavingPredicate = Arc<dyn Fn(&GroupAggregate) -> bool + Send + Sync>;

/// 집계 유형
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationType {
    /// 이벤트 수
    Count,
    /// 합계
    Sum,
    /// 평균
    Avg,
    /// 최소값
    Min,
    /// 최대값
    Max,
    /// 첫 이벤트의 필드 값
    First,
    /// 마지막 이벤트의 필드 값
    Last,
    /// 백분위수 (0~100, 선형 보간)
    Percentile {
        /// 백분위
        p: f64,
    },
    /// 표준편차
    #[serde(rename = "stddev")]
    StdDev,
    /// 분산
    Variance,
    /// 사용자 정의
    #[serde(skip)]
    Custom(CustomAggregator),
    /// 알 수 없는 유형 (결과는 `null`)
    #[serde(other)]
    Unknown,
}

impl fmt::Debug for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile { p } => write!(f, "Percentile({p})"),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
            other => f.write_str(other.name()),
        }
    }
}

impl AggregationType {
    /// 결과에 기록되는 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::Percentile { .. } => "percentile",
            Self::StdDev => "stddev",
            Self::Variance => "variance",
            Self::Custom(_) => "custom",
            Self::Unknown => "unknown",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Sum
                | Self::Avg
                | Self::Min
                | Self::Max
                | Self::Percentile { .. }
                | Self::StdDev
                | Self::Variance
        )
    }
}

/// 집계 설정
#[derive(Clone)]
pub struct AggregationConfig {
    /// 집계 유형
    pub aggregation: AggregationType,
    /// 대상 필드 (count, custom은 생략 가능)
    pub field: Option<String>,
    /// 그룹 키 필드
    pub group_by: Vec<String>,
    /// 결과 필터
    pub having: Option<HavingPredicate>,
}

impl fmt::Debug for AggregationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationConfig")
            .field("aggregation", &self.aggregation)
            .field("field", &self.field)
            .field("group_by", &self.group_by)
            .field("having", &self.having.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl AggregationConfig {
    /// 집계 설정을 생성합니다.
    pub fn new(aggregation: AggregationType) -> Self {
        Self {
            aggregation,
            field: None,
            group_by: Vec::new(),
            having: None,
        }
    }

    /// 대상 필드를 지정합니다.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// 그룹 키 필드를 추가합니다.
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    /// 그룹 필터를 지정합니다. `false`인 그룹은 결과에서 빠집니다.
    pub fn having<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&GroupAggregate) -> bool + Send + Sync + 'static,
    {
        self.having = Some(Arc::new(predicate));
        self
    }

    /// 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ProcessorError> {
        let needs_field = self.aggregation.is_numeric()
            || matches!(self.aggregation, AggregationType::First | AggregationType::Last);
        if needs_field && self.field.as_deref().is_none_or(str::is_empty) {
            return Err(ProcessorError::Aggregation(format!(
                "{} requires a field",
                self.aggregation.name()
            )));
        }
        if let AggregationType::Percentile { p } = self.aggregation {
            if !(0.0..=100.0).contains(&p) {
                return Err(ProcessorError::Aggregation(format!(
                    "percentile must be within 0..=100, got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// 그룹 하나의 집계 값 (`having` 필터 입력)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    /// 그룹 키 (`"*"` 또는 그룹 필드 값의 JSON 배열)
    pub group: String,
    /// 집계 값
    pub value: Value,
    /// 그룹 내 이벤트 수
    pub count: usize,
}

/// 집계 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationMetadata {
    /// 집계 이름
    pub aggregation: String,
    /// 대상 필드
    pub field: Option<String>,
    /// 그룹 키 필드
    pub group_by: Vec<String>,
    /// 남은 그룹별 이벤트 수
    pub counts: BTreeMap<String, usize>,
    /// 윈도우 전체 이벤트 수
    pub event_count: usize,
}

/// 윈도우 하나의 집계 결과
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    /// 윈도우 ID
    pub window_id: String,
    /// 윈도우 시작
    pub start: i64,
    /// 윈도우 종료
    pub end: i64,
    /// 그룹 키 -> 집계 값 (`having`을 통과한 그룹만)
    pub groups: BTreeMap<String, Value>,
    /// 집계 메타데이터
    pub metadata: AggregationMetadata,
}

impl AggregationResult {
    /// 그룹의 집계 값
    pub fn get(&self, group: &str) -> Option<&Value> {
        self.groups.get(group)
    }
}

/// 닫힌 윈도우마다 결과 하나를 만듭니다.
pub fn aggregate(
    windows: &[Window],
    config: &AggregationConfig,
) -> Result<Vec<AggregationResult>, ProcessorError> {
    config.validate()?;
    let mut results = Vec::new();

    for window in windows.iter().filter(|w| w.closed) {
        let mut partitions: BTreeMap<String, Vec<StreamEvent>> = BTreeMap::new();
        for event in &window.events {
            let group = if config.group_by.is_empty() {
                ALL_GROUP.to_owned()
            } else {
                event.group_key(&config.group_by)
            };
            partitions.entry(group).or_default().push(event.clone());
        }

        let mut groups = BTreeMap::new();
        let mut counts = BTreeMap::new();
        for (group, events) in partitions {
            let entry = GroupAggregate {
                value: compute(&config.aggregation, config.field.as_deref(), &events, window)?,
                count: events.len(),
                group,
            };
            if config.having.as_ref().is_none_or(|having| having(&entry)) {
                counts.insert(entry.group.clone(), entry.count);
                groups.insert(entry.group, entry.value);
            }
        }

        results.push(AggregationResult {
            window_id: window.id.clone(),
            start: window.start,
            end: window.end,
            groups,
            metadata: AggregationMetadata {
                aggregation: config.aggregation.name().to_owned(),
                field: config.field.clone(),
                group_by: config.group_by.clone(),
                counts,
                event_count: window.events.len(),
            },
        });
    }
    Ok(results)
}

fn compute(
    aggregation: &AggregationType,
    field: Option<&str>,
    events: &[StreamEvent],
    window: &Window,
) -> Result<Value, ProcessorError> {
    match aggregation {
        AggregationType::Count => return Ok(Value::from(events.len())),
        AggregationType::Custom(f) => return Ok(f(events)),
        AggregationType::Unknown => return Ok(Value::Null),
        AggregationType::First | AggregationType::Last => {
            let field = field.unwrap_or_default();
            let mut present = events.iter().filter_map(|e| e.field(field));
            let picked = if matches!(aggregation, AggregationType::First) {
                present.next()
            } else {
                present.last()
            };
            return Ok(picked.map_or(Value::Null, |v| v.into_owned()));
        }
        _ => {}
    }

    let values = numeric_values(events, field.unwrap_or_default(), &window.id)?;
    if values.is_empty() {
        return Ok(match aggregation {
            AggregationType::Sum => Value::from(0),
            _ => Value::Null,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Ok(number(match aggregation {
        AggregationType::Sum => sum,
        AggregationType::Avg => mean,
        AggregationType::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationType::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationType::Percentile { p } => percentile(values, *p),
        AggregationType::StdDev => variance.sqrt(),
        _ => variance,
    }))
}

fn numeric_values(
    events: &[StreamEvent],
    field: &str,
    window_id: &str,
) -> Result<Vec<f64>, ProcessorError> {
    let mut values = Vec::with_capacity(events.len());
    for event in events {
        let Some(raw) = event.field(field) else {
            continue;
        };
        match raw.as_ref() {
            Value::Null => {}
            Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    values.push(v);
                }
            }
            other => {
                return Err(ProcessorError::NonNumericField {
                    field: field.to_owned(),
                    window_id: window_id.to_owned(),
                    value: other.to_string(),
                });
            }
        }
    }
    Ok(values)
}

/// 정렬 후 `rank = p/100 · (n-1)` 위치를 선형 보간합니다.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(mut values: Vec<f64>, p: f64) -> f64 {
    values.sort_by(f64::total_cmp);
    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - rank.floor();
    values[lower] + (values[upper] - values[lower]) * weight
}

//! 통계 기반 이상 탐지
//!
//! 숫자 필드 하나를 대상으로 배치 단위 통계를 계산합니다.
//! 대상 필드가 숫자가 아니거나 없는 이벤트는 건너뜁니다.
//!
//! | 방식 | 판정 |
//! |------|------|
//! | `zscore` | `|v - mean| / std > threshold` (모집단 표준편차) |
//! | `iqr` | `v < Q1 - 1.5·IQR` 또는 `v > Q3 + 1.5·IQR` |
//! | `isolation_forest` | `|v - mean| / MAD > sensitivity` (평균 절대 편차 휴리스틱) |
//! | `custom` | 사용자 술어 |

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tideway_core::event::StreamEvent;

use crate::error::CepError;

/// IQR 펜스 배수
const IQR_FENCE_MULTIPLIER: f64 = 1.5;

/// IQR 계산에 필요한 최소 표본 수
const IQR_MIN_SAMPLES: usize = 4;

/// 사용자 정의 이상 판정 함수
pub type AnomalyPredicate = Arc<dyn Fn(&StreamEvent) -> bool + Send + Sync>;

/// 이상 탐지 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// z-score
    #[serde(rename = "zscore")]
    ZScore,
    /// 사분위 범위
    Iqr,
    /// 평균 절대 편차 기반 이상치 휴리스틱
    IsolationForest,
    /// 사용자 정의
    Custom,
}

impl AnomalyMethod {
    /// 메트릭 레이블 등에 사용하는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::Iqr => "iqr",
            Self::IsolationForest => "isolation_forest",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이상 탐지 설정
#[derive(Clone)]
pub struct AnomalyConfig {
    /// 탐지 방식
    pub method: AnomalyMethod,
    /// 대상 숫자 필드 경로
    pub field: String,
    /// z-score 임계값 (기본: 엔진 설정)
    pub threshold: Option<f64>,
    /// 이상치 휴리스틱 민감도 (기본: 엔진 설정)
    pub sensitivity: Option<f64>,
    /// 컨텍스트 윈도우 크기 (기본: 엔진 설정)
    pub window_size: Option<usize>,
    /// `custom` 방식의 판정 함수
    pub detector: Option<AnomalyPredicate>,
}

impl fmt::Debug for AnomalyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnomalyConfig")
            .field("method", &self.method)
            .field("field", &self.field)
            .field("threshold", &self.threshold)
            .field("sensitivity", &self.sensitivity)
            .field("window_size", &self.window_size)
            .field("detector", &self.detector.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl AnomalyConfig {
    /// 지정한 방식과 필드로 설정을 생성합니다.
    pub fn new(method: AnomalyMethod, field: impl Into<String>) -> Self {
        Self {
            method,
            field: field.into(),
            threshold: None,
            sensitivity: None,
            window_size: None,
            detector: None,
        }
    }

    /// 사용자 정의 판정 함수로 설정을 생성합니다.
    pub fn custom<F>(field: impl Into<String>, detector: F) -> Self
    where
        F: Fn(&StreamEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            detector: Some(Arc::new(detector)),
            ..Self::new(AnomalyMethod::Custom, field)
        }
    }

    /// z-score 임계값을 지정합니다.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// 이상치 휴리스틱 민감도를 지정합니다.
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }

    /// 컨텍스트 윈도우 크기를 지정합니다.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }
}

/// 설정에서 생략된 값의 기본값
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDefaults {
    /// z-score 임계값
    pub zscore_threshold: f64,
    /// 이상치 휴리스틱 민감도
    pub outlier_sensitivity: f64,
    /// 컨텍스트 윈도우 크기
    pub window_size: usize,
}

impl Default for AnomalyDefaults {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
            outlier_sensitivity: 5.0,
            window_size: 10,
        }
    }
}

/// 탐지된 이상
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    /// 이상 고유 ID
    pub id: String,
    /// 탐지 방식
    pub method: AnomalyMethod,
    /// 대상 필드
    pub field: String,
    /// 관측값 (custom 방식에서 숫자가 아니면 없음)
    pub value: Option<f64>,
    /// 이상 점수 (방식별 단위)
    pub score: f64,
    /// 판정 임계값
    pub threshold: f64,
    /// 이상 이벤트
    pub event: StreamEvent,
    /// 이상 이벤트로 끝나는 직전 이벤트 구간
    pub context: Vec<StreamEvent>,
    /// 탐지 시각
    pub detected_at: SystemTime,
}

/// 배치에서 이상을 탐지합니다.
pub fn detect_anomalies(
    events: &[StreamEvent],
    config: &AnomalyConfig,
    defaults: &AnomalyDefaults,
) -> Result<Vec<Anomaly>, CepError> {
    if config.field.is_empty() && config.method != AnomalyMethod::Custom {
        return Err(CepError::InvalidAnomalyConfig(
            "field must not be empty".to_owned(),
        ));
    }
    let window_size = config.window_size.unwrap_or(defaults.window_size).max(1);

    // (배치 인덱스, 점수, 임계값)
    let flagged: Vec<(usize, f64, f64)> = match config.method {
        AnomalyMethod::ZScore => {
            let threshold = config.threshold.unwrap_or(defaults.zscore_threshold);
            positive("threshold", threshold)?;
            zscore(&numeric_samples(events, &config.field), threshold)
        }
        AnomalyMethod::Iqr => iqr(&numeric_samples(events, &config.field)),
        AnomalyMethod::IsolationForest => {
            let sensitivity = config.sensitivity.unwrap_or(defaults.outlier_sensitivity);
            positive("sensitivity", sensitivity)?;
            mean_deviation(&numeric_samples(events, &config.field), sensitivity)
        }
        AnomalyMethod::Custom => {
            let detector = config.detector.as_ref().ok_or_else(|| {
                CepError::InvalidAnomalyConfig("custom method requires a detector".to_owned())
            })?;
            events
                .iter()
                .enumerate()
                .filter(|&(_, e)| detector(e))
                .map(|(i, _)| (i, 1.0, 1.0))
                .collect()
        }
    };

    let detected_at = SystemTime::now();
    Ok(flagged
        .into_iter()
        .map(|(idx, score, threshold)| {
            let start = (idx + 1).saturating_sub(window_size);
            Anomaly {
                id: uuid::Uuid::new_v4().to_string(),
                method: config.method,
                field: config.field.clone(),
                value: events[idx].numeric_field(&config.field),
                score,
                threshold,
                event: events[idx].clone(),
                context: events[start..=idx].to_vec(),
                detected_at,
            }
        })
        .collect())
}

fn positive(name: &str, v: f64) -> Result<(), CepError> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(CepError::InvalidAnomalyConfig(format!(
            "{name} must be a positive number, got {v}"
        )))
    }
}

/// 숫자 필드가 있는 이벤트의 (인덱스, 값) 목록
fn numeric_samples(events: &[StreamEvent], field: &str) -> Vec<(usize, f64)> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.numeric_field(field).map(|v| (i, v)))
        .filter(|(_, v)| v.is_finite())
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(samples: &[(usize, f64)]) -> f64 {
    samples.iter().map(|(_, v)| v).sum::<f64>() / samples.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn zscore(samples: &[(usize, f64)], threshold: f64) -> Vec<(usize, f64, f64)> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let mean = mean(samples);
    let variance =
        samples.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return Vec::new();
    }
    samples
        .iter()
        .filter_map(|&(i, v)| {
            let z = (v - mean).abs() / std;
            (z > threshold).then_some((i, z, threshold))
        })
        .collect()
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn iqr(samples: &[(usize, f64)]) -> Vec<(usize, f64, f64)> {
    if samples.len() < IQR_MIN_SAMPLES {
        return Vec::new();
    }
    let mut sorted: Vec<f64> = samples.iter().map(|&(_, v)| v).collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let q1 = sorted[(n * 0.25).floor() as usize];
    let q3 = sorted[(n * 0.75).floor() as usize];
    let spread = q3 - q1;
    let lower = q1 - IQR_FENCE_MULTIPLIER * spread;
    let upper = q3 + IQR_FENCE_MULTIPLIER * spread;

    samples
        .iter()
        .filter_map(|&(i, v)| {
            let distance = if v < lower {
                lower - v
            } else if v > upper {
                v - upper
            } else {
                return None;
            };
            let score = if spread > 0.0 { distance / spread } else { distance };
            Some((i, score, IQR_FENCE_MULTIPLIER))
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean_deviation(samples: &[(usize, f64)], sensitivity: f64) -> Vec<(usize, f64, f64)> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let mean = mean(samples);
    let mad = samples.iter().map(|(_, v)| (v - mean).abs()).sum::<f64>() / samples.len() as f64;
    if mad == 0.0 {
        return Vec::new();
    }
    samples
        .iter()
        .filter_map(|&(i, v)| {
            let score = (v - mean).abs() / mad;
            (score > sensitivity).then_some((i, score, sensitivity))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(values: &[f64]) -> Vec<StreamEvent> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| StreamEvent::new("sensor", json!({"v": v}), i as i64))
            .collect()
    }

    fn with_spike(len: usize, spike_at: usize) -> Vec<StreamEvent> {
        let values: Vec<f64> = (0..len)
            .map(|i| if i == spike_at { 100.0 } else { 10.0 + (i % 2) as f64 })
            .collect();
        series(&values)
    }

    #[test]
    fn zscore_flags_spike() {
        let events = with_spike(20, 15);
        let found = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::ZScore, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.timestamp, 15);
        assert!(found[0].score > 3.0);
        assert_eq!(found[0].value, Some(100.0));
    }

    #[test]
    fn zscore_constant_series_has_no_anomalies() {
        let events = series(&[5.0; 10]);
        let found = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::ZScore, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn iqr_flags_outlier() {
        let events = series(&[10.0, 11.0, 12.0, 11.0, 10.0, 12.0, 11.0, 90.0]);
        let found = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::Iqr, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, Some(90.0));
    }

    #[test]
    fn mean_deviation_heuristic_flags_outlier() {
        let events = with_spike(20, 3);
        let found = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::IsolationForest, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.timestamp, 3);
    }

    #[test]
    fn custom_requires_detector() {
        let events = series(&[1.0]);
        let err = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::Custom, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CepError::InvalidAnomalyConfig(_)));
    }

    #[test]
    fn custom_detector() {
        let events = series(&[1.0, 50.0, 2.0]);
        let config = AnomalyConfig::custom("v", |e| e.numeric_field("v").unwrap_or(0.0) > 10.0);
        let found = detect_anomalies(&events, &config, &AnomalyDefaults::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event.timestamp, 1);
    }

    #[test]
    fn context_is_trailing_window() {
        let events = with_spike(20, 15);
        let config = AnomalyConfig::new(AnomalyMethod::ZScore, "v").with_window_size(4);
        let found = detect_anomalies(&events, &config, &AnomalyDefaults::default()).unwrap();
        let stamps: Vec<_> = found[0].context.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![12, 13, 14, 15]);
    }

    #[test]
    fn context_truncated_at_batch_start() {
        let events = with_spike(20, 1);
        let config = AnomalyConfig::new(AnomalyMethod::ZScore, "v").with_window_size(10);
        let found = detect_anomalies(&events, &config, &AnomalyDefaults::default()).unwrap();
        assert_eq!(found[0].context.len(), 2);
    }

    #[test]
    fn non_numeric_events_skipped() {
        let mut events = with_spike(20, 15);
        events.push(StreamEvent::new("sensor", json!({"v": "n/a"}), 99));
        events.push(StreamEvent::new("sensor", json!({}), 100));
        let found = detect_anomalies(
            &events,
            &AnomalyConfig::new(AnomalyMethod::ZScore, "v"),
            &AnomalyDefaults::default(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let events = series(&[1.0, 2.0]);
        let config = AnomalyConfig::new(AnomalyMethod::ZScore, "v").with_threshold(0.0);
        assert!(detect_anomalies(&events, &config, &AnomalyDefaults::default()).is_err());
    }
}

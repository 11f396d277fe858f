//! 윈도우 정의와 할당 규칙
//!
//! | 유형 | ID | 구간 |
//! |------|----|------|
//! | tumbling | `tumbling:{floor(ts / size)}` | `[n·size, (n+1)·size)` |
//! | sliding | `sliding:{start}` | `start`는 `slide`의 배수, `start <= ts < start + size` |
//! | session | `session:{n}` | 마지막 이벤트로부터 `gap` 이내면 같은 세션 |
//! | custom | `custom:{n}` | 사용자 분할 함수가 결정, 즉시 닫힘 |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tideway_core::event::StreamEvent;

use crate::error::ProcessorError;

/// 사용자 정의 윈도우 분할 함수
pub type WindowSplitter = Arc<dyn Fn(&[StreamEvent]) -> Vec<Vec<StreamEvent>> + Send + Sync>;

/// 윈도우 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// 고정 크기, 겹치지 않음
    Tumbling,
    /// 고정 크기, 일정 간격으로 겹침
    Sliding,
    /// 비활성 간격으로 구분
    Session,
    /// 사용자 분할
    Custom,
}

impl WindowType {
    /// 윈도우 ID 접두어
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tumbling => "tumbling",
            Self::Sliding => "sliding",
            Self::Session => "session",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 윈도우 설정
#[derive(Clone)]
pub struct WindowConfig {
    /// 윈도우 유형
    pub window_type: WindowType,
    /// 윈도우 크기 (tumbling, sliding)
    pub size_ms: Option<u64>,
    /// 슬라이드 간격 (sliding)
    pub slide_ms: Option<u64>,
    /// 세션 간격 (session)
    pub gap_ms: Option<u64>,
    /// 분할 함수 (custom)
    pub splitter: Option<WindowSplitter>,
    /// 허용 지연 (없으면 프로세서 기본값)
    pub allowed_lateness_ms: Option<u64>,
}

impl fmt::Debug for WindowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowConfig")
            .field("window_type", &self.window_type)
            .field("size_ms", &self.size_ms)
            .field("slide_ms", &self.slide_ms)
            .field("gap_ms", &self.gap_ms)
            .field("splitter", &self.splitter.as_ref().map(|_| "<fn>"))
            .field("allowed_lateness_ms", &self.allowed_lateness_ms)
            .finish()
    }
}

impl WindowConfig {
    /// tumbling 윈도우
    pub fn tumbling(size_ms: u64) -> Self {
        Self {
            window_type: WindowType::Tumbling,
            size_ms: Some(size_ms),
            slide_ms: None,
            gap_ms: None,
            splitter: None,
            allowed_lateness_ms: None,
        }
    }

    /// sliding 윈도우
    pub fn sliding(size_ms: u64, slide_ms: u64) -> Self {
        Self {
            window_type: WindowType::Sliding,
            size_ms: Some(size_ms),
            slide_ms: Some(slide_ms),
            gap_ms: None,
            splitter: None,
            allowed_lateness_ms: None,
        }
    }

    /// session 윈도우
    pub fn session(gap_ms: u64) -> Self {
        Self {
            window_type: WindowType::Session,
            size_ms: None,
            slide_ms: None,
            gap_ms: Some(gap_ms),
            splitter: None,
            allowed_lateness_ms: None,
        }
    }

    /// custom 윈도우
    pub fn custom<F>(splitter: F) -> Self
    where
        F: Fn(&[StreamEvent]) -> Vec<Vec<StreamEvent>> + Send + Sync + 'static,
    {
        Self {
            window_type: WindowType::Custom,
            size_ms: None,
            slide_ms: None,
            gap_ms: None,
            splitter: Some(Arc::new(splitter)),
            allowed_lateness_ms: None,
        }
    }

    /// 허용 지연을 지정합니다.
    pub fn with_allowed_lateness(mut self, lateness_ms: u64) -> Self {
        self.allowed_lateness_ms = Some(lateness_ms);
        self
    }

    /// 유형에 필요한 매개변수가 있는지 검증합니다.
    pub fn validate(&self) -> Result<(), ProcessorError> {
        let positive = |name: &str, v: Option<u64>| match v {
            Some(ms) if ms > 0 => Ok(()),
            Some(_) => Err(ProcessorError::WindowConfig(format!(
                "{} window {name} must be greater than 0",
                self.window_type
            ))),
            None => Err(ProcessorError::WindowConfig(format!(
                "{} window requires {name}",
                self.window_type
            ))),
        };
        match self.window_type {
            WindowType::Tumbling => positive("size_ms", self.size_ms),
            WindowType::Sliding => {
                positive("size_ms", self.size_ms)?;
                positive("slide_ms", self.slide_ms)
            }
            WindowType::Session => positive("gap_ms", self.gap_ms),
            WindowType::Custom => {
                if self.splitter.is_some() {
                    Ok(())
                } else {
                    Err(ProcessorError::WindowConfig(
                        "custom window requires a splitter".to_owned(),
                    ))
                }
            }
        }
    }
}

/// 윈도우
#[derive(Debug, Clone, Serialize)]
pub struct Window {
    /// 윈도우 ID
    pub id: String,
    /// 윈도우 유형
    pub window_type: WindowType,
    /// 시작 시각 (포함)
    pub start: i64,
    /// 종료 시각 (제외)
    pub end: i64,
    /// 할당된 이벤트 (도착 순서)
    pub events: Vec<StreamEvent>,
    /// 닫힘 여부
    pub closed: bool,
}

impl Window {
    pub(crate) fn new(id: String, window_type: WindowType, start: i64, end: i64) -> Self {
        Self {
            id,
            window_type,
            start,
            end,
            events: Vec::new(),
            closed: false,
        }
    }
}

/// 고정 크기 윈도우 경계
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub id: String,
    pub start: i64,
    pub end: i64,
}

fn ms(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// tumbling 윈도우 할당
pub(crate) fn tumbling_slot(ts: i64, size_ms: u64) -> Slot {
    let size = ms(size_ms);
    let n = ts.div_euclid(size);
    let start = n.saturating_mul(size);
    Slot {
        id: format!("tumbling:{n}"),
        start,
        end: start.saturating_add(size),
    }
}

/// sliding 윈도우 할당 (시작 시각 오름차순)
pub(crate) fn sliding_slots(ts: i64, size_ms: u64, slide_ms: u64) -> Vec<Slot> {
    let (size, slide) = (ms(size_ms), ms(slide_ms));
    let mut start = ts.saturating_sub(size).div_euclid(slide).saturating_mul(slide);
    let mut slots = Vec::new();
    while start <= ts {
        let end = start.saturating_add(size);
        if ts < end {
            slots.push(Slot {
                id: format!("sliding:{start}"),
                start,
                end,
            });
        }
        start = start.saturating_add(slide);
    }
    slots
}

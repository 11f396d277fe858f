//! 조인 설정
//!
//! - [`StreamJoinerConfig`]: core의 `[join]` 섹션에서 파생되는 조이너 설정
//! - [`JoinConfig`]: 호출마다 전달하는 조인 유형, 키, 윈도우

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JoinError;

/// 조인 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// 양쪽 모두 매칭된 쌍만
    #[default]
    Inner,
    /// 왼쪽 이벤트는 매칭이 없어도 출력
    Left,
    /// 오른쪽 이벤트는 매칭이 없어도 출력
    Right,
    /// 양쪽 모두 매칭이 없어도 출력
    Full,
}

impl JoinType {
    /// 메트릭 라벨 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
            Self::Full => "full",
        }
    }

    pub(crate) fn keeps_left(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    pub(crate) fn keeps_right(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스트림 조이너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamJoinerConfig {
    /// 호출 설정에 윈도우가 없을 때 사용하는 기본 윈도우 (밀리초)
    pub default_window_ms: u64,
}

impl Default for StreamJoinerConfig {
    fn default() -> Self {
        Self::from_core(&tideway_core::config::JoinConfig::default())
    }
}

impl StreamJoinerConfig {
    /// core 설정에서 생성합니다.
    pub fn from_core(core: &tideway_core::config::JoinConfig) -> Self {
        Self {
            default_window_ms: core.window_ms,
        }
    }
}

/// 호출별 조인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// 조인 유형
    #[serde(default)]
    pub join_type: JoinType,
    /// 왼쪽 스트림 조인 키 필드
    pub left_key: String,
    /// 오른쪽 스트림 조인 키 필드
    pub right_key: String,
    /// 윈도우 크기 (밀리초). 없으면 조이너 기본값
    #[serde(default)]
    pub window_ms: Option<u64>,
}

impl JoinConfig {
    /// 양쪽이 같은 키 필드를 쓰는 설정
    pub fn new(join_type: JoinType, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            join_type,
            left_key: key.clone(),
            right_key: key,
            window_ms: None,
        }
    }

    /// 오른쪽 키 필드를 따로 지정합니다.
    pub fn right_key(mut self, key: impl Into<String>) -> Self {
        self.right_key = key.into();
        self
    }

    /// 윈도우 크기를 지정합니다.
    pub fn within(mut self, window_ms: u64) -> Self {
        self.window_ms = Some(window_ms);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), JoinError> {
        if self.left_key.is_empty() {
            return Err(JoinError::config("left_key", "must not be empty"));
        }
        if self.right_key.is_empty() {
            return Err(JoinError::config("right_key", "must not be empty"));
        }
        if self.window_ms == Some(0) {
            return Err(JoinError::config("window_ms", "must be greater than 0"));
        }
        Ok(())
    }
}

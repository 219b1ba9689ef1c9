//! Capture cadence and retention limits.
//!
//! Both enums are plain values; display strings live in [`crate::labels`].

use serde::{Deserialize, Serialize};

/// How often a location takes part in automatic capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyPolicy {
    #[default]
    Manual,
    Hourly,
    #[serde(rename = "every_2h")]
    Every2h,
    #[serde(rename = "every_6h")]
    Every6h,
    #[serde(rename = "every_12h")]
    Every12h,
    Daily,
}

impl FrequencyPolicy {
    pub const ALL: [FrequencyPolicy; 6] = [
        Self::Manual,
        Self::Hourly,
        Self::Every2h,
        Self::Every6h,
        Self::Every12h,
        Self::Daily,
    ];

    /// Stable storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Hourly => "hourly",
            Self::Every2h => "every_2h",
            Self::Every6h => "every_6h",
            Self::Every12h => "every_12h",
            Self::Daily => "daily",
        }
    }

    /// Inverse of [`as_str`](Self::as_str). Unknown keys read as `Manual`.
    pub fn from_key(key: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .unwrap_or_default()
    }

    /// Whether the location should be captured in a cycle running at `hour`.
    ///
    /// Interval policies are aligned to midnight, so `Every6h` captures at
    /// 00, 06, 12 and 18. `Daily` captures once at `daily_hour`.
    pub fn is_due(&self, hour: u32, daily_hour: u32) -> bool {
        match self {
            Self::Manual => false,
            Self::Hourly => true,
            Self::Every2h => hour % 2 == 0,
            Self::Every6h => hour % 6 == 0,
            Self::Every12h => hour % 12 == 0,
            Self::Daily => hour == daily_hour,
        }
    }
}

/// How many of the most recent snapshots a location keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RetentionPolicy {
    MaxSnapshots(u32),
    #[default]
    Unbounded,
}

impl RetentionPolicy {
    /// The limit, or `None` when everything is kept.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::MaxSnapshots(max) => Some(*max as usize),
            Self::Unbounded => None,
        }
    }

    /// Storage form: `NULL` is unbounded.
    pub fn to_column(self) -> Option<i64> {
        match self {
            Self::MaxSnapshots(max) => Some(i64::from(max)),
            Self::Unbounded => None,
        }
    }

    pub fn from_column(value: Option<i64>) -> Self {
        match value.and_then(|v| u32::try_from(v).ok()) {
            Some(max) => Self::MaxSnapshots(max),
            None => Self::Unbounded,
        }
    }
}

impl From<Option<u32>> for RetentionPolicy {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Self::Unbounded, Self::MaxSnapshots)
    }
}

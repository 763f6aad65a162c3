// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use super::scheduled_job::DomainError;

static EVERY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^every\s+(\d+)\s*(minute|minutes|min|hour|hours|day|days|week|weeks)$")
        .expect("static schedule regex")
});

static COMPACT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*([mhdw])$").expect("static schedule regex"));

/// 调度周期
///
/// 由定时爬取的 `schedule_expression` 解析而来，支持：
/// - `hourly` / `daily` / `weekly` / `monthly`（按30天计）
/// - `every N minutes|hours|days|weeks`
/// - 紧凑写法 `30m`、`6h`、`1d`、`2w`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    /// 以固定间隔创建调度周期
    pub fn every(interval: Duration) -> Result<Self, DomainError> {
        if interval <= Duration::zero() {
            return Err(DomainError::ValidationError(
                "schedule interval must be positive".to_string(),
            ));
        }
        Ok(Self { interval })
    }

    pub fn daily() -> Self {
        Self {
            interval: Duration::days(1),
        }
    }

    /// 调度间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 基于给定时间计算下一次运行时间
    pub fn next_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + self.interval
    }
}

impl FromStr for Schedule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();

        let interval = match normalized.as_str() {
            "hourly" => Duration::hours(1),
            "daily" => Duration::days(1),
            "weekly" => Duration::weeks(1),
            "monthly" => Duration::days(30),
            other => {
                if let Some(caps) = EVERY_PATTERN.captures(other) {
                    let amount = parse_amount(&caps[1])?;
                    match &caps[2] {
                        "minute" | "minutes" | "min" => Duration::minutes(amount),
                        "hour" | "hours" => Duration::hours(amount),
                        "day" | "days" => Duration::days(amount),
                        _ => Duration::weeks(amount),
                    }
                } else if let Some(caps) = COMPACT_PATTERN.captures(other) {
                    let amount = parse_amount(&caps[1])?;
                    match &caps[2] {
                        "m" => Duration::minutes(amount),
                        "h" => Duration::hours(amount),
                        "d" => Duration::days(amount),
                        _ => Duration::weeks(amount),
                    }
                } else {
                    return Err(DomainError::ValidationError(format!(
                        "unsupported schedule expression: {}",
                        s
                    )));
                }
            }
        };

        Self::every(interval)
    }
}

fn parse_amount(raw: &str) -> Result<i64, DomainError> {
    raw.parse::<i64>()
        .ok()
        .filter(|n| *n > 0 && *n <= 10_000)
        .ok_or_else(|| DomainError::ValidationError(format!("invalid schedule amount: {}", raw)))
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let minutes = self.interval.num_minutes();
        if minutes % (60 * 24 * 7) == 0 {
            write!(f, "{}w", minutes / (60 * 24 * 7))
        } else if minutes % (60 * 24) == 0 {
            write!(f, "{}d", minutes / (60 * 24))
        } else if minutes % 60 == 0 {
            write!(f, "{}h", minutes / 60)
        } else {
            write!(f, "{}m", minutes)
        }
    }
}

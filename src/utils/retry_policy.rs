// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 可重试错误特质
///
/// 由错误类型自行判断是否属于瞬时故障
pub trait Retryable {
    /// 是否值得再次尝试
    fn is_retryable(&self) -> bool;
}

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（第一次执行也计入）
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用指数退避
    pub exponential_backoff: bool,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            exponential_backoff: true,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn standard() -> Self {
        Self::default()
    }

    /// 整体爬取重试策略
    ///
    /// 3次尝试，间隔严格递增，不加抖动
    pub fn crawl() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(3),
            max_backoff: Duration::from_secs(600),
            backoff_multiplier: 4.0,
            jitter_factor: 0.0,
            exponential_backoff: true,
            enable_jitter: false,
        }
    }

    /// 计算第 `attempt` 次失败之后的退避时间（从1开始）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.initial_backoff;
        }

        let exponent = attempt.max(1) as i32 - 1;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let jitter_range = capped_backoff * self.jitter_factor;
        let final_backoff = if self.enable_jitter && jitter_range > 0.0 {
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 第 `attempt` 次尝试失败后是否还能继续
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// 结合错误类型判断是否应该重试
    ///
    /// 不可重试的错误直接失败，不消耗重试次数
    pub fn should_retry_with_error<E: Retryable + ?Sized>(&self, attempt: u32, error: &E) -> bool {
        self.should_retry(attempt) && error.is_retryable()
    }
}

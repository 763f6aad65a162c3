// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::utils::retry_policy::RetryPolicy;

/// 应用程序配置设置
///
/// 包含数据库、服务器、调度器、爬虫和指标等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 爬虫配置
    pub crawler: CrawlerSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
    /// 连接最长存活时间（秒）
    pub max_lifetime: Option<u64>,
    /// 是否以 debug 级别记录 SQL 语句
    #[serde(default)]
    pub log_statements: bool,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 是否在本进程尝试启动调度器
    pub enabled: bool,
    /// 锁文件路径，多个进程共享
    pub lock_path: String,
    /// 锁健康检查间隔（秒）
    pub lock_check_interval_secs: u64,
    /// 到期检查间隔（秒）
    pub tick_interval_secs: u64,
}

impl SchedulerSettings {
    pub fn lock_check_interval(&self) -> Duration {
        Duration::from_secs(self.lock_check_interval_secs.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

/// 爬虫配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSettings {
    /// 请求使用的User-Agent
    pub user_agent: String,
    /// 单个请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 每秒最多请求数
    pub requests_per_second: u32,
    /// 漫画爬取的执行时间预算（秒）
    pub manga_max_duration_secs: u64,
    /// 小说爬取的执行时间预算（秒）
    pub novel_max_duration_secs: u64,
    /// 整体重试配置
    pub retry: RetrySettings,
    /// 默认漫画站点选择器
    pub manga_selectors: SelectorSettings,
    /// 默认小说站点选择器
    pub novel_selectors: SelectorSettings,
    /// 按域名覆盖的选择器
    #[serde(default)]
    pub sites: Vec<SiteSettings>,
}

impl CrawlerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 重试配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 总尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 初始退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 最大退避时间（毫秒）
    pub max_backoff_ms: u64,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_attempts,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            backoff_multiplier: settings.backoff_multiplier,
            jitter_factor: 0.0,
            exponential_backoff: true,
            enable_jitter: false,
        }
    }
}

/// 站点选择器配置
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSettings {
    /// 标题选择器
    pub title: String,
    /// 章节链接选择器
    pub chapter_links: String,
    /// 章节图片选择器（漫画）
    pub chapter_images: String,
    /// 章节正文选择器（小说）
    pub chapter_content: String,
    /// 章节列表是否最新在前
    #[serde(default)]
    pub newest_first: bool,
}

/// 单个站点的选择器覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    /// 站点域名，例如 `example.com`
    pub host: String,
    /// 该站点使用的选择器
    pub selectors: SelectorSettings,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出
    pub enabled: bool,
    /// 监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `MANGACRAWL__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("MANGACRAWL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 只包含内置默认值的构建器
    pub fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Server
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Database
            .set_default("database.url", "sqlite://mangacrawl.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("database.max_lifetime", 3600)?
            .set_default("database.log_statements", false)?
            // Scheduler
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.lock_path", "tmp/scheduler.lock")?
            .set_default("scheduler.lock_check_interval_secs", 60)?
            .set_default("scheduler.tick_interval_secs", 60)?
            // Crawler
            .set_default("crawler.user_agent", "Mozilla/5.0 (compatible; mangacrawl/0.1)")?
            .set_default("crawler.request_timeout_secs", 30)?
            .set_default("crawler.requests_per_second", 2)?
            .set_default("crawler.manga_max_duration_secs", 2 * 60 * 60)?
            .set_default("crawler.novel_max_duration_secs", 3 * 60 * 60)?
            .set_default("crawler.retry.max_attempts", 3)?
            .set_default("crawler.retry.initial_backoff_ms", 3000)?
            .set_default("crawler.retry.backoff_multiplier", 4.0)?
            .set_default("crawler.retry.max_backoff_ms", 10 * 60 * 1000)?
            .set_default("crawler.manga_selectors.title", "h1")?
            .set_default(
                "crawler.manga_selectors.chapter_links",
                ".chapter-list a, ul.chapters a, .list-chapter a",
            )?
            .set_default(
                "crawler.manga_selectors.chapter_images",
                ".reading-content img, .page-chapter img, .chapter-content img",
            )?
            .set_default("crawler.manga_selectors.chapter_content", ".chapter-content")?
            .set_default("crawler.manga_selectors.newest_first", true)?
            .set_default("crawler.novel_selectors.title", "h1")?
            .set_default(
                "crawler.novel_selectors.chapter_links",
                ".chapter-list a, ul.chapters a, .list-chapter a",
            )?
            .set_default("crawler.novel_selectors.chapter_images", "img")?
            .set_default(
                "crawler.novel_selectors.chapter_content",
                ".chapter-content, #chapter-content, .reading-content",
            )?
            .set_default("crawler.novel_selectors.newest_first", false)?
            // Metrics
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }

    /// 仅使用内置默认值构建配置（测试与工具使用）
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let settings = Settings::defaults().unwrap();

        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.crawler.retry.max_attempts, 3);
        assert_eq!(settings.crawler.manga_max_duration_secs, 7200);
        assert_eq!(settings.crawler.novel_max_duration_secs, 10800);
        assert_eq!(settings.scheduler.lock_check_interval(), Duration::from_secs(60));
        assert!(settings.crawler.sites.is_empty());
        assert!(settings.crawler.manga_selectors.newest_first);
    }

    #[test]
    fn test_retry_settings_into_policy() {
        let settings = Settings::defaults().unwrap();
        let policy = RetryPolicy::from(&settings.crawler.retry);

        assert_eq!(policy.max_retries, 3);
        assert!(!policy.enable_jitter);
        assert_eq!(policy.initial_backoff, Duration::from_millis(3000));
    }
}

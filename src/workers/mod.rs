// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台爬取任务的执行：状态推进、整体重试和管理员通知
pub mod crawl_job;

pub use crawl_job::CrawlJobRunner;

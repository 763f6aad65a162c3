// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 管理端接口：定时爬取的维护与手动触发、手动爬取和任务查询
pub mod crawl_handler;
pub mod scheduled_crawl_handler;

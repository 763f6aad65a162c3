// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 章节解析（chapter_extractor）：按站点选择器解析目录页与章节页
/// - 爬取服务（crawl_service）：单次爬取的执行逻辑
/// - 任务记录器（job_tracker）：任务生命周期的状态流转
/// - 定时爬取服务（scheduled_crawl_service）：到期查询与单个定时爬取的执行
pub mod chapter_extractor;
pub mod crawl_service;
pub mod job_tracker;
pub mod scheduled_crawl_service;

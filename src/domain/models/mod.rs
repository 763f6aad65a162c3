// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 定时爬取（scheduled_crawl）：周期性爬取定义
/// - 任务记录（scheduled_job）：一次爬取执行的生命周期
/// - 爬取结果（crawl_result）：一次爬取的内存结果
/// - 调度周期（schedule）：调度表达式解析
/// - 内容（content）：漫画与章节
/// - 通知（notification）：发给管理员的通知
pub mod content;
pub mod crawl_result;
pub mod notification;
pub mod schedule;
pub mod scheduled_crawl;
pub mod scheduled_job;

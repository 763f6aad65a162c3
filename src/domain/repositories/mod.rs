// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 内容仓库（content_repository）：保存漫画与章节
/// - 通知（notification_repository）：向管理员投递通知
/// - 定时爬取仓库（scheduled_crawl_repository）：周期性爬取定义
/// - 任务记录仓库（scheduled_job_repository）：一次执行的生命周期
pub mod content_repository;
pub mod notification_repository;
pub mod scheduled_crawl_repository;
pub mod scheduled_job_repository;

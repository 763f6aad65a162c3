// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// HTTP 抓取引擎
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、进程锁、指标等
pub mod infrastructure;

/// 表示层模块
///
/// 管理端HTTP接口，包括路由和处理器
pub mod presentation;

/// 队列模块
///
/// 定时爬取的调度驱动
pub mod queue;

/// 工具模块
///
/// 重试策略与日志初始化
pub mod utils;

/// 工作器模块
///
/// 爬取任务的执行、重试与通知
pub mod workers;

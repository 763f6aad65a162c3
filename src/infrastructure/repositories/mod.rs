// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的数据库实现
pub mod content_repo_impl;
pub mod notifier_impl;
pub mod scheduled_crawl_repo_impl;
pub mod scheduled_job_repo_impl;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use std::io::ErrorKind;
use std::path::PathBuf;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 锁文件错误
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 自检结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockHealth {
    /// 锁文件存在且属于本进程
    Owned,
    /// 锁文件被外部删除，已重新创建
    Healed,
    /// 锁文件属于其他进程（内容无法解析时 `owner` 为空），本进程必须停止调度
    Demoted { owner: Option<u32> },
    /// 读写锁文件失败，按不再持有处理
    Lost,
}

fn record(event: &'static str) {
    counter!("scheduler_lock_events_total", "event" => event).increment(1);
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

/// 进程锁协调器
///
/// 多个服务进程共享同一文件系统时，通过一个只包含持有者进程号的锁文件
/// 保证只有一个进程运行调度器。创建使用 create-exclusive 语义，
/// 已存在与其他 I/O 错误分开处理。
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    path: PathBuf,
    pid: u32,
}

impl LockCoordinator {
    pub fn new(path: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            path: path.into(),
            pid,
        }
    }

    /// 以当前进程号创建协调器
    pub fn for_current_process(path: impl Into<PathBuf>) -> Self {
        Self::new(path, std::process::id())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn try_create(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await?;
        file.write_all(self.pid.to_string().as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// 读取锁文件中的持有者
    ///
    /// # 返回值
    ///
    /// * `Ok(None)` - 锁文件不存在
    /// * `Ok(Some(None))` - 锁文件存在但内容无法解析
    /// * `Ok(Some(Some(pid)))` - 持有者进程号
    async fn read_owner(&self) -> std::io::Result<Option<Option<u32>>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content.trim().parse::<u32>().ok())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 持有者进程已不存在时移除锁文件
    ///
    /// 先把锁文件改名到唯一的临时路径，再确认改名拿到的仍是过期的那个文件。
    /// 若拿到的是其他进程刚创建的新锁，用硬链接原样放回，不覆盖已存在的锁。
    ///
    /// # 返回值
    ///
    /// 锁文件已不存在、可以重新创建时返回true
    async fn reclaim_stale(&self) -> Result<bool, LockError> {
        let owner = match self.read_owner().await.map_err(|e| self.io_error(e))? {
            Some(Some(owner)) => owner,
            // 文件刚被删除，可以直接重试
            None => return Ok(true),
            Some(None) => return Ok(false),
        };

        if owner == self.pid || process_alive(owner) {
            return Ok(false);
        }

        self.remove_stale(owner).await
    }

    /// 仅当锁文件仍属于 `owner` 时移除它
    async fn remove_stale(&self, owner: u32) -> Result<bool, LockError> {
        let aside = self.aside_path();
        match fs::rename(&self.path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(self.io_error(e)),
        }

        let taken = fs::read_to_string(&aside)
            .await
            .ok()
            .and_then(|c| c.trim().parse::<u32>().ok());

        if taken == Some(owner) {
            if let Err(e) = fs::remove_file(&aside).await {
                warn!(path = %aside.display(), "Failed to remove stale scheduler lock: {}", e);
            }
            warn!(path = %self.path.display(), stale_pid = owner, "Removed stale scheduler lock");
            record("reclaimed");
            return Ok(true);
        }

        // Another process replaced the stale lock first; put its lock back.
        match fs::hard_link(&aside, &self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %self.path.display(), owner = ?taken, "Scheduler lock replaced while reclaiming");
            }
            Err(e) => {
                let _ = fs::remove_file(&aside).await;
                return Err(self.io_error(e));
            }
        }
        if let Err(e) = fs::remove_file(&aside).await {
            warn!(path = %aside.display(), "Failed to remove scheduler lock copy: {}", e);
        }
        Ok(false)
    }

    fn aside_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".stale-{}-{}", self.pid, Uuid::new_v4().simple()));
        PathBuf::from(name)
    }

    /// 尝试获取锁
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(LockGuard))` - 获得锁，守卫离开作用域时释放
    /// * `Ok(None)` - 锁由其他进程持有，本进程不应启动调度器
    /// * `Err(LockError)` - I/O 错误，调用方同样不应启动调度器
    pub async fn acquire(&self) -> Result<Option<LockGuard>, LockError> {
        let created = match self.try_create().await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.reclaim_stale().await? {
                    match self.try_create().await {
                        Ok(()) => true,
                        Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
                        Err(e) => return Err(self.io_error(e)),
                    }
                } else {
                    false
                }
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if created {
            info!(path = %self.path.display(), pid = self.pid, "Scheduler lock acquired");
            record("acquired");
            Ok(Some(LockGuard {
                coordinator: self.clone(),
                released: false,
            }))
        } else {
            info!(path = %self.path.display(), "Scheduler lock held by another process");
            record("contended");
            Ok(None)
        }
    }

    /// 释放锁，只删除属于本进程的锁文件
    ///
    /// # 返回值
    ///
    /// 删除了锁文件时返回true
    pub async fn release(&self) -> Result<bool, LockError> {
        match self.read_owner().await.map_err(|e| self.io_error(e))? {
            Some(Some(owner)) if owner == self.pid => {}
            _ => return Ok(false),
        }

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Scheduler lock released");
                record("released");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// 校验并自愈
    ///
    /// 锁文件缺失时重新创建；持有者不是本进程时返回 `Demoted`；
    /// 任何 I/O 错误都返回 `Lost`
    pub async fn verify_and_heal(&self) -> LockHealth {
        let health = match self.read_owner().await {
            Ok(Some(Some(owner))) if owner == self.pid => LockHealth::Owned,
            Ok(Some(owner)) => LockHealth::Demoted { owner },
            Ok(None) => match self.try_create().await {
                Ok(()) => {
                    warn!(path = %self.path.display(), "Scheduler lock file was missing, recreated");
                    record("healed");
                    LockHealth::Healed
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let owner = self.read_owner().await.ok().flatten().flatten();
                    LockHealth::Demoted { owner }
                }
                Err(e) => {
                    error!(path = %self.path.display(), "Failed to recreate scheduler lock: {}", e);
                    LockHealth::Lost
                }
            },
            Err(e) => {
                error!(path = %self.path.display(), "Failed to read scheduler lock: {}", e);
                LockHealth::Lost
            }
        };

        match health {
            LockHealth::Demoted { owner } => {
                warn!(
                    path = %self.path.display(),
                    pid = self.pid,
                    owner = ?owner,
                    "Scheduler lock owned by another process"
                );
                record("demoted");
            }
            LockHealth::Lost => record("lost"),
            _ => {}
        }

        health
    }
}

/// 锁守卫
///
/// 离开作用域时同步删除锁文件（仅当文件仍属于本进程）
#[derive(Debug)]
pub struct LockGuard {
    coordinator: LockCoordinator,
    released: bool,
}

impl LockGuard {
    /// 显式释放
    pub async fn release(mut self) -> Result<bool, LockError> {
        self.released = true;
        self.coordinator.release().await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let path = &self.coordinator.path;
        let owned = std::fs::read_to_string(path)
            .ok()
            .and_then(|c| c.trim().parse::<u32>().ok())
            == Some(self.coordinator.pid);

        if owned {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), "Failed to remove scheduler lock on drop: {}", e);
            } else {
                info!(path = %path.display(), "Scheduler lock released");
            }
        }
    }
}

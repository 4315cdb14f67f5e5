use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info};

use crate::display::render_text;
use crate::source::{OS_RELEASE_PATH, PASSWD_PATH, PROC_DIR, ProcFs, StatSource};
use crate::system::System;

/// 清屏并把光标移到左上角
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// 配置结构
#[derive(Debug, Clone)]
pub struct Config {
    /// proc 文件系统根目录
    pub proc_root: PathBuf,
    /// 操作系统标识文件
    pub os_release_path: PathBuf,
    /// 用户数据库
    pub passwd_path: PathBuf,
    /// 刷新间隔
    pub refresh_interval: Duration,
    /// 显示的进程行数
    pub rows: usize,
    /// 画面宽度，用于截断命令行
    pub width: usize,
    /// 输出指定帧数后退出，`None` 表示一直运行
    pub frame_limit: Option<u64>,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(PROC_DIR),
            os_release_path: PathBuf::from(OS_RELEASE_PATH),
            passwd_path: PathBuf::from(PASSWD_PATH),
            refresh_interval: Duration::from_secs(1),
            rows: 10,
            width: 120,
            frame_limit: None,
        }
    }
}

impl Config {
    /// 按配置路径构建数据源
    #[inline]
    pub fn source(&self) -> ProcFs {
        ProcFs::new(&self.proc_root, &self.os_release_path, &self.passwd_path)
    }
}

/// 刷新循环
pub struct Monitor<S> {
    system: System<S>,
    config: Config,
}

impl Monitor<ProcFs> {
    /// 使用配置中的真实 /proc 路径
    pub fn from_config(config: Config) -> Self {
        let system = System::new(config.source());
        Self::new(system, config)
    }
}

impl<S: StatSource> Monitor<S> {
    #[inline]
    pub fn new(system: System<S>, config: Config) -> Self {
        Self { system, config }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 采样一次并渲染一帧
    pub fn frame(&self) -> String {
        let snapshot = self.system.snapshot();
        debug!(
            "采样完成: {} 个进程，CPU {:.3}，内存 {:.3}",
            snapshot.processes.len(),
            snapshot.cpu_utilization,
            snapshot.memory_utilization
        );
        render_text(&snapshot, self.config.rows, self.config.width)
    }

    /// 按刷新间隔循环输出画面，直到收到 Ctrl-C 或达到帧数上限
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(
            "开始刷新，间隔 {:?}，显示 {} 行",
            self.config.refresh_interval, self.config.rows
        );

        let mut frames = 0u64;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut ctrl_c => {
                    info!("收到中断信号，停止刷新");
                    break;
                }
            }

            let frame = self.frame();
            write!(out, "{CLEAR_SCREEN}{frame}")?;
            out.flush()?;

            frames += 1;
            if self.config.frame_limit.is_some_and(|limit| frames >= limit) {
                info!("已输出 {frames} 帧，停止刷新");
                break;
            }
        }

        Ok(())
    }
}

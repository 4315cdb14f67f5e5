//! 进程快照与进程表

use log::debug;

use crate::parser::{self, MetricsParser, ProcTimes, UserDb};
use crate::source::StatSource;

/// 单个进程在一次采样中的身份与计数器
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    /// 命令行，内核线程为空
    pub command: String,
    pub uid: String,
    /// 用户名，无法解析时为空
    pub user: String,
    /// `VmSize`，没有该行时为 `None`
    pub vm_size_kb: Option<u64>,
    /// stat 不可读（进程已退出）时为 `None`
    pub times: Option<ProcTimes>,
    /// 进程已运行的秒数
    pub uptime_seconds: u64,
    /// 生命周期内的平均 CPU 占用率
    pub cpu_utilization: f32,
}

impl ProcessSnapshot {
    /// 采集一个进程
    ///
    /// 进程可能在枚举之后、读取之前退出，此时对应字段保留默认值，
    /// 快照仍然返回。
    pub fn capture<S: StatSource>(
        parser: &MetricsParser<S>,
        pid: u32,
        system_uptime: u64,
        users: &UserDb,
    ) -> Self {
        let hz = parser.clock_ticks();
        let uid = parser.uid(pid);
        let user = users.resolve(&uid);
        let vm_size_kb = parser.try_vm_size_kb(pid).ok();

        let times = match parser.try_proc_times(pid) {
            Ok(times) => Some(times),
            Err(e) => {
                debug!("进程 {pid} 的 stat 不可用: {e}");
                None
            }
        };

        let (uptime_seconds, cpu_utilization) = match &times {
            Some(t) => (
                parser::process_uptime(system_uptime, t.starttime, hz),
                parser::process_cpu_utilization(t, system_uptime, hz).unwrap_or_else(|e| {
                    debug!("进程 {pid} 的 CPU 占用率按 0 处理: {e}");
                    0.0
                }),
            ),
            None => (0, 0.0),
        };

        Self {
            pid,
            command: parser.command(pid),
            uid,
            user,
            vm_size_kb,
            times,
            uptime_seconds,
            cpu_utilization,
        }
    }

    /// 内存占用（MB），截断取整
    #[inline]
    pub fn ram_mb(&self) -> Option<u64> {
        self.vm_size_kb.map(parser::ram_megabytes)
    }

    /// 供显示用的内存字符串，不可用时为空
    pub fn ram(&self) -> String {
        self.ram_mb().map(|mb| mb.to_string()).unwrap_or_default()
    }
}

/// 按 CPU 占用率降序排列的进程表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessTable {
    processes: Vec<ProcessSnapshot>,
}

impl ProcessTable {
    /// 枚举全部存活进程并排序
    pub fn build<S: StatSource>(parser: &MetricsParser<S>) -> Self {
        Self::build_with_uptime(parser, parser.uptime())
    }

    /// 使用已读取的系统运行时间构建，保证同一次采样中的数值一致
    pub fn build_with_uptime<S: StatSource>(parser: &MetricsParser<S>, system_uptime: u64) -> Self {
        let users = parser.user_db();
        let snapshots = parser
            .pids()
            .into_iter()
            .map(|pid| ProcessSnapshot::capture(parser, pid, system_uptime, &users))
            .collect();
        Self::from_snapshots(snapshots)
    }

    /// 稳定排序，占用率相同的进程保持发现顺序
    pub fn from_snapshots(mut processes: Vec<ProcessSnapshot>) -> Self {
        processes.sort_by(|a, b| b.cpu_utilization.total_cmp(&a.cpu_utilization));
        Self { processes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[ProcessSnapshot] {
        &self.processes
    }

    /// 占用率最高的前 `n` 个进程
    #[inline]
    pub fn top(&self, n: usize) -> &[ProcessSnapshot] {
        &self.processes[..n.min(self.processes.len())]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ProcessSnapshot> {
        self.processes.iter()
    }

    #[inline]
    pub fn into_vec(self) -> Vec<ProcessSnapshot> {
        self.processes
    }
}

impl<'a> IntoIterator for &'a ProcessTable {
    type Item = &'a ProcessSnapshot;
    type IntoIter = std::slice::Iter<'a, ProcessSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.processes.iter()
    }
}

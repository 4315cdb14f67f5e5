use std::time::Instant;

use crate::parser::{self, MetricsParser};
use crate::process::ProcessTable;
use crate::source::{StatFile, StatSource};

/// 一次采样得到的系统指标
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    pub os_name: String,
    pub kernel: String,
    pub cpu_utilization: f32,    // 开机以来平均 CPU 占用率 (0.0-1.0)
    pub memory_utilization: f32, // 内存占用率 (0.0-1.0)
    pub uptime_seconds: u64,
    pub total_processes: u64,
    pub running_processes: u64,
    pub processes: ProcessTable,
    pub timestamp: Instant, // 采样时间戳
}

impl Default for SystemSnapshot {
    #[inline]
    fn default() -> Self {
        Self {
            os_name: String::new(),
            kernel: String::new(),
            cpu_utilization: 0.0,
            memory_utilization: 0.0,
            uptime_seconds: 0,
            total_processes: 0,
            running_processes: 0,
            processes: ProcessTable::default(),
            timestamp: Instant::now(),
        }
    }
}

/// 系统指标聚合器
///
/// 各访问器每次调用都会重新读取伪文件；需要一组彼此一致的数值时
/// 使用 [`System::snapshot`]。
#[derive(Debug, Clone)]
pub struct System<S> {
    parser: MetricsParser<S>,
}

impl<S: StatSource> System<S> {
    #[inline]
    pub fn new(source: S) -> Self {
        Self::with_parser(MetricsParser::new(source))
    }

    #[inline]
    pub fn with_parser(parser: MetricsParser<S>) -> Self {
        Self { parser }
    }

    #[inline]
    pub fn parser(&self) -> &MetricsParser<S> {
        &self.parser
    }

    pub fn operating_system(&self) -> String {
        self.parser.os_name()
    }

    pub fn kernel(&self) -> String {
        self.parser.kernel()
    }

    pub fn memory_utilization(&self) -> f32 {
        self.parser.memory_utilization()
    }

    pub fn cpu_utilization(&self) -> f32 {
        self.parser.cpu_utilization()
    }

    pub fn uptime(&self) -> u64 {
        self.parser.uptime()
    }

    pub fn total_processes(&self) -> u64 {
        self.parser.total_processes()
    }

    pub fn running_processes(&self) -> u64 {
        self.parser.running_processes()
    }

    /// 重新构建进程表
    pub fn processes(&self) -> ProcessTable {
        ProcessTable::build(&self.parser)
    }

    /// 完成一次采样
    ///
    /// `/proc/stat` 与 `/proc/uptime` 各只读取一次，
    /// 系统运行时间同时用于所有进程的计算。
    pub fn snapshot(&self) -> SystemSnapshot {
        let stat = self.parser.source().read_or_empty(StatFile::Stat);
        let uptime_seconds = self.parser.uptime();

        SystemSnapshot {
            os_name: self.parser.os_name(),
            kernel: self.parser.kernel(),
            cpu_utilization: parser::or_default(
                "CPU 占用率",
                parser::parse_cpu_counters(&stat).and_then(|counters| counters.utilization()),
            ),
            memory_utilization: self.parser.memory_utilization(),
            uptime_seconds,
            total_processes: parser::or_default(
                "进程总数",
                parser::parse_stat_counter(&stat, "processes"),
            ),
            running_processes: parser::or_default(
                "运行中进程数",
                parser::parse_stat_counter(&stat, "procs_running"),
            ),
            processes: ProcessTable::build_with_uptime(&self.parser, uptime_seconds),
            timestamp: Instant::now(),
        }
    }
}

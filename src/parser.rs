//! 指标解析
//!
//! 把 [`StatSource`] 读到的原始文本转换为带类型的数值，并计算派生指标。
//! 所有 `parse_*` 函数都是纯函数，解析失败返回 [`ParseError`]；
//! [`MetricsParser`] 上的同名访问器在失败时记录日志并返回零值或空值，
//! 监视器宁可显示 0 也不应崩溃。

use std::fmt;
use std::io;

use log::debug;

use crate::source::{RawStatLine, StatFile, StatSource, find_line};

/// 无法从运行环境获得时钟频率时使用的 HZ
pub const DEFAULT_CLOCK_TICKS: u64 = 100;

/// 内存换算：kB 到 MB 采用十进制除数
pub const KB_PER_MB: u64 = 1000;

// `/proc/<pid>/stat` 各字段位置，按 proc(5) 从 1 开始编号。
// 内核接口一旦调整这些偏移就会失效，这里不做推断。
const STAT_FIELD_UTIME: usize = 14;
const STAT_FIELD_STIME: usize = 15;
const STAT_FIELD_CUTIME: usize = 16;
const STAT_FIELD_CSTIME: usize = 17;
const STAT_FIELD_STARTTIME: usize = 22;

/// 解析错误类型
#[derive(Debug)]
pub enum ParseError {
    /// 伪文件不可读
    Io(io::Error),
    /// 缺少预期的键或字段
    MissingField(&'static str),
    /// 字段存在但不是合法数字
    MalformedNumber { field: &'static str, value: String },
    /// 分母为零，结果无定义
    DivisionByZero(&'static str),
}

impl From<io::Error> for ParseError {
    #[inline]
    fn from(error: io::Error) -> Self {
        ParseError::Io(error)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "IO 错误: {e}"),
            ParseError::MissingField(field) => write!(f, "缺少字段: {field}"),
            ParseError::MalformedNumber { field, value } => {
                write!(f, "字段 {field} 不是合法数字: {value:?}")
            }
            ParseError::DivisionByZero(what) => write!(f, "{what} 的分母为零"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

fn parse_number(field: &'static str, token: Option<&str>) -> Result<u64> {
    let token = token.ok_or(ParseError::MissingField(field))?;
    token.parse().map_err(|_| ParseError::MalformedNumber {
        field,
        value: token.to_string(),
    })
}

/// 读取行首为 `key` 的行的第一个数值
fn keyed_number(content: &str, key: &'static str) -> Result<u64> {
    let line = find_line(content, key).ok_or(ParseError::MissingField(key))?;
    parse_number(key, line.token(1))
}

/// 系统时钟频率（每秒时钟滴答数）
pub fn clock_ticks_per_second() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf 只查询配置值，没有副作用
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if hz > 0 {
            return hz as u64;
        }
    }
    DEFAULT_CLOCK_TICKS
}

/// `/proc/meminfo` 中的内存统计，单位 kB
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub buffers_kb: u64,
    pub cached_kb: u64,
}

impl MemInfo {
    /// 内存占用率 = (总量 - 空闲 - 缓存 - 缓冲) / 总量
    ///
    /// 内核输出满足 `total >= free + cached + buffers`，这里不做校验。
    pub fn utilization(&self) -> Result<f32> {
        if self.total_kb == 0 {
            return Err(ParseError::DivisionByZero("内存占用率"));
        }
        let used = self.total_kb as f64
            - self.free_kb as f64
            - self.cached_kb as f64
            - self.buffers_kb as f64;
        Ok((used / self.total_kb as f64) as f32)
    }
}

/// 解析 `/proc/meminfo`，四个字段缺一不可
pub fn parse_meminfo(content: &str) -> Result<MemInfo> {
    Ok(MemInfo {
        total_kb: keyed_number(content, "MemTotal:")?,
        free_kb: keyed_number(content, "MemFree:")?,
        buffers_kb: keyed_number(content, "Buffers:")?,
        cached_kb: keyed_number(content, "Cached:")?,
    })
}

/// `/proc/stat` 中 `cpu` 行各列的含义，顺序与内核一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    User = 0,
    Nice,
    System,
    Idle,
    IoWait,
    Irq,
    SoftIrq,
    Steal,
    Guest,
    GuestNice,
}

impl CpuState {
    pub const COUNT: usize = 10;

    /// 计入活跃时间的状态
    pub const ACTIVE: [CpuState; 6] = [
        CpuState::User,
        CpuState::Nice,
        CpuState::System,
        CpuState::Irq,
        CpuState::SoftIrq,
        CpuState::Steal,
    ];

    /// 计入空闲时间的状态
    pub const IDLE: [CpuState; 2] = [CpuState::Idle, CpuState::IoWait];

    /// 解析时必须存在的列数（到 steal 为止）
    const REQUIRED: usize = CpuState::Steal as usize + 1;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    fn name(index: usize) -> &'static str {
        const NAMES: [&str; CpuState::COUNT] = [
            "user",
            "nice",
            "system",
            "idle",
            "iowait",
            "irq",
            "softirq",
            "steal",
            "guest",
            "guest_nice",
        ];
        NAMES[index]
    }
}

/// 开机以来各 CPU 状态累计的 jiffies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CpuCounters {
    values: [u64; CpuState::COUNT],
}

impl CpuCounters {
    pub fn new(values: [u64; CpuState::COUNT]) -> Self {
        Self { values }
    }

    #[inline]
    pub fn get(&self, state: CpuState) -> u64 {
        self.values[state.index()]
    }

    pub fn active_jiffies(&self) -> u64 {
        CpuState::ACTIVE
            .iter()
            .map(|&s| self.get(s))
            .fold(0, u64::saturating_add)
    }

    pub fn idle_jiffies(&self) -> u64 {
        CpuState::IDLE
            .iter()
            .map(|&s| self.get(s))
            .fold(0, u64::saturating_add)
    }

    #[inline]
    pub fn total_jiffies(&self) -> u64 {
        self.active_jiffies().saturating_add(self.idle_jiffies())
    }

    /// CPU 占用率 = 活跃 / (活跃 + 空闲)
    ///
    /// 计数器是开机以来的累计值，因此结果是开机以来的平均占用率，
    /// 而不是两次采样之间的瞬时值。
    pub fn utilization(&self) -> Result<f32> {
        let total = self.total_jiffies();
        if total == 0 {
            return Err(ParseError::DivisionByZero("CPU 占用率"));
        }
        Ok((self.active_jiffies() as f64 / total as f64) as f32)
    }
}

/// 解析 `/proc/stat` 的汇总 `cpu` 行
pub fn parse_cpu_counters(content: &str) -> Result<CpuCounters> {
    let line = find_line(content, "cpu").ok_or(ParseError::MissingField("cpu"))?;
    let columns = line.values();
    if columns.len() < CpuState::REQUIRED {
        return Err(ParseError::MissingField(CpuState::name(columns.len())));
    }

    let mut values = [0u64; CpuState::COUNT];
    // 旧内核没有 guest 列，缺失时保持 0
    for (index, slot) in values.iter_mut().enumerate() {
        if let Some(&token) = columns.get(index) {
            *slot = parse_number(CpuState::name(index), Some(token))?;
        }
    }
    Ok(CpuCounters::new(values))
}

/// 解析 `/proc/stat` 中 `processes`、`procs_running` 这类单值行
pub fn parse_stat_counter(content: &str, key: &'static str) -> Result<u64> {
    keyed_number(content, key)
}

/// 解析 `/proc/uptime`，舍去小数部分
pub fn parse_uptime(content: &str) -> Result<u64> {
    let token = content
        .split_whitespace()
        .next()
        .ok_or(ParseError::MissingField("uptime"))?;
    let seconds: f64 = token.parse().map_err(|_| ParseError::MalformedNumber {
        field: "uptime",
        value: token.to_string(),
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ParseError::MalformedNumber {
            field: "uptime",
            value: token.to_string(),
        });
    }
    Ok(seconds as u64)
}

/// 从 os-release 中取 `PRETTY_NAME`
pub fn parse_os_name(content: &str) -> Result<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .ok_or(ParseError::MissingField("PRETTY_NAME"))
}

/// `/proc/version` 首行形如 `Linux version 6.1.0 ...`，取第三个记号
pub fn parse_kernel(content: &str) -> Result<String> {
    let line = RawStatLine::new(content.lines().next().unwrap_or_default());
    line.token(2)
        .map(str::to_string)
        .ok_or(ParseError::MissingField("kernel"))
}

/// 单个进程的 CPU 时间，单位为时钟滴答
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcTimes {
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
    pub starttime: u64,
}

impl ProcTimes {
    /// 进程自启动以来消耗的 CPU 时间（含已回收的子进程）
    #[inline]
    pub fn total_ticks(&self) -> u64 {
        [self.utime, self.stime, self.cutime, self.cstime]
            .into_iter()
            .fold(0, u64::saturating_add)
    }
}

/// 按位置解析 `/proc/<pid>/stat`
///
/// 取第 14、15、16、17、22 个字段。第 2 个字段是括号包围的命令名，
/// 其中可能含有空格，所以先在最后一个 `)` 处切开，再按空白计数。
pub fn parse_proc_stat(content: &str) -> Result<ProcTimes> {
    let content = content.trim();
    let fields: Vec<&str> = match content.rfind(')') {
        Some(close) => {
            let (head, tail) = content.split_at(close + 1);
            let pid = head.split_whitespace().next().unwrap_or_default();
            [pid, head.get(pid.len()..).unwrap_or_default().trim()]
                .into_iter()
                .chain(tail.split_whitespace())
                .collect()
        }
        None => content.split_whitespace().collect(),
    };

    if fields.len() < STAT_FIELD_STARTTIME {
        return Err(ParseError::MissingField("starttime"));
    }

    let field = |position: usize, name: &'static str| {
        parse_number(name, fields.get(position - 1).copied())
    };

    Ok(ProcTimes {
        utime: field(STAT_FIELD_UTIME, "utime")?,
        stime: field(STAT_FIELD_STIME, "stime")?,
        cutime: field(STAT_FIELD_CUTIME, "cutime")?,
        cstime: field(STAT_FIELD_CSTIME, "cstime")?,
        starttime: field(STAT_FIELD_STARTTIME, "starttime")?,
    })
}

/// `/proc/<pid>/status` 中 `Uid:` 行的第一个值（真实 uid）
pub fn parse_uid(content: &str) -> Result<String> {
    find_line(content, "Uid:")
        .and_then(|line| line.token(1))
        .map(str::to_string)
        .ok_or(ParseError::MissingField("Uid:"))
}

/// `/proc/<pid>/status` 中的 `VmSize:`，内核线程没有这一行
pub fn parse_vm_size_kb(content: &str) -> Result<u64> {
    keyed_number(content, "VmSize:")
}

/// `/proc/<pid>/cmdline` 以 NUL 分隔参数，转为空格分隔
pub fn parse_cmdline(content: &str) -> String {
    content.trim_end_matches('\0').replace('\0', " ")
}

/// kB 转 MB，截断而非四舍五入
#[inline]
pub fn ram_megabytes(vm_size_kb: u64) -> u64 {
    vm_size_kb / KB_PER_MB
}

/// 进程已运行的秒数 = 系统运行时间 - 启动时刻
#[inline]
pub fn process_uptime(system_uptime: u64, starttime_ticks: u64, hz: u64) -> u64 {
    system_uptime.saturating_sub(starttime_ticks / hz.max(1))
}

/// 进程 CPU 占用率 = (CPU 时间 / HZ) / (系统运行时间 - 启动时刻 / HZ)
///
/// 结果是进程整个生命周期的平均值。刚启动的进程经过时间可能为零，
/// 此时返回 [`ParseError::DivisionByZero`]。
pub fn process_cpu_utilization(times: &ProcTimes, system_uptime: u64, hz: u64) -> Result<f32> {
    let hz = hz.max(1) as f64;
    let elapsed = system_uptime as f64 - times.starttime as f64 / hz;
    if elapsed <= 0.0 {
        return Err(ParseError::DivisionByZero("进程 CPU 占用率"));
    }
    Ok(((times.total_ticks() as f64 / hz) / elapsed) as f32)
}

/// 用户数据库（`/etc/passwd` 文本）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDb {
    content: String,
}

impl UserDb {
    #[inline]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// 查找第一行包含 `x:<uid>` 的记录，返回第一个 `:` 之前的用户名
    ///
    /// 这是子串匹配，未找到时返回空字符串。
    pub fn resolve(&self, uid: &str) -> String {
        if uid.is_empty() {
            return String::new();
        }
        let needle = format!("x:{uid}");
        self.content
            .lines()
            .find(|line| line.contains(&needle))
            .and_then(|line| line.split(':').next())
            .unwrap_or_default()
            .to_string()
    }
}

/// 把解析失败折算为默认值
pub(crate) fn or_default<T: Default>(metric: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        debug!("{metric} 解析失败，使用默认值: {e}");
        T::default()
    })
}

/// 指标解析器
///
/// 不持有任何缓存，每次调用都会重新读取对应的伪文件。
#[derive(Debug, Clone)]
pub struct MetricsParser<S> {
    source: S,
    hz: u64,
}

impl<S: StatSource> MetricsParser<S> {
    /// 使用运行环境的时钟频率
    pub fn new(source: S) -> Self {
        Self::with_clock_ticks(source, clock_ticks_per_second())
    }

    pub fn with_clock_ticks(source: S, hz: u64) -> Self {
        Self {
            source,
            hz: hz.max(1),
        }
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn clock_ticks(&self) -> u64 {
        self.hz
    }

    fn read(&self, file: StatFile) -> Result<String> {
        Ok(self.source.read(file)?)
    }

    pub fn try_os_name(&self) -> Result<String> {
        parse_os_name(&self.read(StatFile::OsRelease)?)
    }

    pub fn os_name(&self) -> String {
        or_default("操作系统名称", self.try_os_name())
    }

    pub fn try_kernel(&self) -> Result<String> {
        parse_kernel(&self.read(StatFile::Version)?)
    }

    pub fn kernel(&self) -> String {
        or_default("内核版本", self.try_kernel())
    }

    pub fn try_memory_info(&self) -> Result<MemInfo> {
        parse_meminfo(&self.read(StatFile::MemInfo)?)
    }

    pub fn try_memory_utilization(&self) -> Result<f32> {
        self.try_memory_info()?.utilization()
    }

    pub fn memory_utilization(&self) -> f32 {
        or_default("内存占用率", self.try_memory_utilization())
    }

    pub fn try_cpu_counters(&self) -> Result<CpuCounters> {
        parse_cpu_counters(&self.read(StatFile::Stat)?)
    }

    pub fn cpu_counters(&self) -> CpuCounters {
        or_default("CPU 计数器", self.try_cpu_counters())
    }

    pub fn cpu_utilization(&self) -> f32 {
        or_default(
            "CPU 占用率",
            self.try_cpu_counters().and_then(|c| c.utilization()),
        )
    }

    pub fn try_uptime(&self) -> Result<u64> {
        parse_uptime(&self.read(StatFile::Uptime)?)
    }

    pub fn uptime(&self) -> u64 {
        or_default("系统运行时间", self.try_uptime())
    }

    pub fn total_processes(&self) -> u64 {
        or_default(
            "进程总数",
            self.read(StatFile::Stat)
                .and_then(|c| parse_stat_counter(&c, "processes")),
        )
    }

    pub fn running_processes(&self) -> u64 {
        or_default(
            "运行中进程数",
            self.read(StatFile::Stat)
                .and_then(|c| parse_stat_counter(&c, "procs_running")),
        )
    }

    /// 当前存活的进程号，失败时为空列表
    pub fn pids(&self) -> Vec<u32> {
        or_default("进程列表", self.source.pids().map_err(ParseError::from))
    }

    pub fn command(&self, pid: u32) -> String {
        parse_cmdline(&self.source.read_or_empty(StatFile::Cmdline(pid)))
    }

    pub fn try_uid(&self, pid: u32) -> Result<String> {
        parse_uid(&self.read(StatFile::Status(pid))?)
    }

    pub fn uid(&self, pid: u32) -> String {
        or_default("uid", self.try_uid(pid))
    }

    /// 读取用户数据库，每次调用都重新读取
    pub fn user_db(&self) -> UserDb {
        UserDb::new(self.source.read_or_empty(StatFile::Passwd))
    }

    pub fn user(&self, pid: u32) -> String {
        self.user_db().resolve(&self.uid(pid))
    }

    pub fn try_vm_size_kb(&self, pid: u32) -> Result<u64> {
        parse_vm_size_kb(&self.read(StatFile::Status(pid))?)
    }

    /// 进程内存（MB 字符串），没有 `VmSize` 时为空字符串
    pub fn ram(&self, pid: u32) -> String {
        match self.try_vm_size_kb(pid) {
            Ok(kb) => ram_megabytes(kb).to_string(),
            Err(e) => {
                debug!("进程 {pid} 没有可用的内存数据: {e}");
                String::new()
            }
        }
    }

    pub fn try_proc_times(&self, pid: u32) -> Result<ProcTimes> {
        parse_proc_stat(&self.read(StatFile::ProcStat(pid))?)
    }

    pub fn try_process_uptime(&self, pid: u32) -> Result<u64> {
        let times = self.try_proc_times(pid)?;
        Ok(process_uptime(self.try_uptime()?, times.starttime, self.hz))
    }

    pub fn process_uptime(&self, pid: u32) -> u64 {
        or_default("进程运行时间", self.try_process_uptime(pid))
    }

    pub fn try_process_cpu_utilization(&self, pid: u32) -> Result<f32> {
        let times = self.try_proc_times(pid)?;
        process_cpu_utilization(&times, self.try_uptime()?, self.hz)
    }

    pub fn process_cpu_utilization(&self, pid: u32) -> f32 {
        or_default("进程 CPU 占用率", self.try_process_cpu_utilization(pid))
    }
}

//! 伪文件读取层
//!
//! 核心逻辑只通过 [`StatSource`] 访问内核导出的文本接口，
//! 生产环境使用 [`ProcFs`]，测试与基准使用 [`MockSource`]。

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// 默认的 proc 文件系统挂载点
pub const PROC_DIR: &str = "/proc";
/// 操作系统标识文件
pub const OS_RELEASE_PATH: &str = "/etc/os-release";
/// 用户数据库
pub const PASSWD_PATH: &str = "/etc/passwd";

/// 逻辑指标名，对应一个具体的伪文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatFile {
    /// `/etc/os-release`
    OsRelease,
    /// `/proc/version`
    Version,
    /// `/proc/meminfo`
    MemInfo,
    /// `/proc/stat`
    Stat,
    /// `/proc/uptime`
    Uptime,
    /// `/etc/passwd`
    Passwd,
    /// `/proc/<pid>/cmdline`
    Cmdline(u32),
    /// `/proc/<pid>/status`
    Status(u32),
    /// `/proc/<pid>/stat`
    ProcStat(u32),
}

/// 伪文件数据源
pub trait StatSource {
    /// 完整读取一个伪文件
    fn read(&self, file: StatFile) -> io::Result<String>;

    /// 列出当前存活的进程号，顺序即发现顺序
    fn pids(&self) -> io::Result<Vec<u32>>;

    /// 读取失败时返回空字符串
    fn read_or_empty(&self, file: StatFile) -> String {
        self.read(file).unwrap_or_else(|e| {
            debug!("读取 {file:?} 失败，按空内容处理: {e}");
            String::new()
        })
    }
}

/// 真实文件系统实现
#[derive(Debug, Clone)]
pub struct ProcFs {
    proc_root: PathBuf,
    os_release: PathBuf,
    passwd: PathBuf,
}

impl Default for ProcFs {
    #[inline]
    fn default() -> Self {
        Self::new(PROC_DIR, OS_RELEASE_PATH, PASSWD_PATH)
    }
}

impl ProcFs {
    pub fn new(
        proc_root: impl Into<PathBuf>,
        os_release: impl Into<PathBuf>,
        passwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            os_release: os_release.into(),
            passwd: passwd.into(),
        }
    }

    /// 逻辑指标对应的实际路径
    pub fn path(&self, file: StatFile) -> PathBuf {
        match file {
            StatFile::OsRelease => self.os_release.clone(),
            StatFile::Passwd => self.passwd.clone(),
            StatFile::Version => self.proc_root.join("version"),
            StatFile::MemInfo => self.proc_root.join("meminfo"),
            StatFile::Stat => self.proc_root.join("stat"),
            StatFile::Uptime => self.proc_root.join("uptime"),
            StatFile::Cmdline(pid) => self.proc_root.join(pid.to_string()).join("cmdline"),
            StatFile::Status(pid) => self.proc_root.join(pid.to_string()).join("status"),
            StatFile::ProcStat(pid) => self.proc_root.join(pid.to_string()).join("stat"),
        }
    }

    #[inline]
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl StatSource for ProcFs {
    fn read(&self, file: StatFile) -> io::Result<String> {
        // cmdline 以 NUL 分隔，且可能含非 UTF-8 字节
        let bytes = std::fs::read(self.path(file))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn pids(&self) -> io::Result<Vec<u32>> {
        let mut pids = Vec::new();
        for entry in std::fs::read_dir(&self.proc_root)? {
            // 进程可能在遍历途中退出
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(parse_pid) else {
                continue;
            };
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        Ok(pids)
    }
}

/// 目录名全部由数字组成时视为进程号
fn parse_pid(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// 内存中的伪文件集合
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    files: HashMap<StatFile, String>,
    pids: Vec<u32>,
}

impl MockSource {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置某个伪文件的内容
    pub fn with_file(mut self, file: StatFile, content: impl Into<String>) -> Self {
        self.files.insert(file, content.into());
        self
    }

    /// 登记一个进程号，只登记不写文件即模拟读取前已退出的进程
    pub fn with_pid(mut self, pid: u32) -> Self {
        if !self.pids.contains(&pid) {
            self.pids.push(pid);
        }
        self
    }

    /// 登记进程并写入其 stat/status/cmdline
    pub fn with_process(self, pid: u32, stat: &str, status: &str, cmdline: &str) -> Self {
        self.with_pid(pid)
            .with_file(StatFile::ProcStat(pid), stat)
            .with_file(StatFile::Status(pid), status)
            .with_file(StatFile::Cmdline(pid), cmdline)
    }
}

impl StatSource for MockSource {
    fn read(&self, file: StatFile) -> io::Result<String> {
        self.files.get(&file).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{file:?} 不存在"))
        })
    }

    fn pids(&self) -> io::Result<Vec<u32>> {
        Ok(self.pids.clone())
    }
}

/// 伪文件中的一行，按空白切分的有序记号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatLine<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> RawStatLine<'a> {
    #[inline]
    pub fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace().collect(),
        }
    }

    /// 行首记号
    #[inline]
    pub fn key(&self) -> Option<&'a str> {
        self.tokens.first().copied()
    }

    /// 第 `index` 个记号（从 0 开始，0 为行首记号）
    #[inline]
    pub fn token(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).copied()
    }

    /// 行首记号之后的全部记号
    #[inline]
    pub fn values(&self) -> &[&'a str] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// 找到第一行行首记号等于 `key` 的行
pub fn find_line<'a>(content: &'a str, key: &str) -> Option<RawStatLine<'a>> {
    content
        .lines()
        .map(RawStatLine::new)
        .find(|line| line.key() == Some(key))
}

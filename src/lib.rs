//! 进程监视器库
//!
//! 这个库读取 Linux `/proc` 伪文件，解析内存、CPU、运行时间与进程计数器，
//! 并生成按 CPU 占用率排序的进程表。

pub mod app;
pub mod display;
pub mod format;
pub mod parser;
pub mod process;
pub mod source;
pub mod system;

// 重新导出主要的公共类型
pub use app::{Config, Monitor};
pub use parser::{MetricsParser, ParseError};
pub use process::{ProcessSnapshot, ProcessTable};
pub use source::{MockSource, ProcFs, StatFile, StatSource};
pub use system::{System, SystemSnapshot};

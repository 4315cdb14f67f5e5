use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use swb_proc_monitor::{Config, Monitor};

/// 进程监视器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// proc 文件系统根目录 (默认: /proc)
    #[arg(short = 'r', long, default_value = "/proc")]
    proc_root: PathBuf,

    /// 操作系统标识文件 (默认: /etc/os-release)
    #[arg(long, default_value = "/etc/os-release")]
    os_release: PathBuf,

    /// 用户数据库 (默认: /etc/passwd)
    #[arg(long, default_value = "/etc/passwd")]
    passwd: PathBuf,

    /// 显示的进程行数 (默认: 10)
    #[arg(short = 'n', long, default_value_t = 10)]
    rows: usize,

    /// 刷新间隔秒数 (默认: 1)
    #[arg(short, long, default_value_t = 1)]
    interval: u64,

    /// 输出指定帧数后退出
    #[arg(short, long)]
    count: Option<u64>,

    /// 画面宽度 (默认: 120)
    #[arg(short, long, default_value_t = 120)]
    width: usize,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    init_logger(&args.log_level);

    if args.interval == 0 {
        bail!("刷新间隔必须大于 0 秒");
    }

    // 从命令行参数创建配置
    let config = Config {
        proc_root: args.proc_root,
        os_release_path: args.os_release,
        passwd_path: args.passwd,
        refresh_interval: Duration::from_secs(args.interval),
        rows: args.rows,
        width: args.width,
        frame_limit: args.count,
    };

    info!(
        "配置信息 - proc: {}, 行数: {}, 间隔: {} 秒",
        config.proc_root.display(),
        config.rows,
        args.interval
    );

    let monitor = Monitor::from_config(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    monitor.run(&mut out).await?;

    info!("监视器正常退出");

    Ok(())
}

/// 初始化日志系统
fn init_logger(level: &str) {
    // 日志写到 stderr，不会混入画面
    match env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init()
    {
        Ok(_) => info!("日志系统初始化成功，级别: {level}"),
        Err(e) => eprintln!("日志系统初始化失败: {e}，使用默认设置"),
    }
}

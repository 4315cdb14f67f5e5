use crate::format::{elapsed_time, progress_bar, truncate};
use crate::system::SystemSnapshot;

// 进程表各列的起始位置
const PID_COLUMN: usize = 0;
const USER_COLUMN: usize = 7;
const CPU_COLUMN: usize = 16;
const RAM_COLUMN: usize = 24;
const TIME_COLUMN: usize = 33;
const COMMAND_COLUMN: usize = 44;

/// 把一次采样渲染为纯文本画面
///
/// 只显示 CPU 占用最高的 `rows` 个进程，命令行按 `width` 截断。
pub fn render_text(snapshot: &SystemSnapshot, rows: usize, width: usize) -> String {
    // 预分配容量，减少重新分配
    let mut out = String::with_capacity(256 + rows * width.max(COMMAND_COLUMN));

    out.push_str(&format!(
        "OS: {}\nKernel: {}\nCPU:    {}\nMemory: {}\nTotal Processes: {}\nRunning Processes: {}\nUp Time: {}\n\n",
        snapshot.os_name,
        snapshot.kernel,
        progress_bar(snapshot.cpu_utilization),
        progress_bar(snapshot.memory_utilization),
        snapshot.total_processes,
        snapshot.running_processes,
        elapsed_time(snapshot.uptime_seconds),
    ));

    let mut line = String::with_capacity(width.max(COMMAND_COLUMN));
    push_column(&mut line, PID_COLUMN, "PID");
    push_column(&mut line, USER_COLUMN, "USER");
    push_column(&mut line, CPU_COLUMN, "CPU[%]");
    push_column(&mut line, RAM_COLUMN, "RAM[MB]");
    push_column(&mut line, TIME_COLUMN, "TIME+");
    push_column(&mut line, COMMAND_COLUMN, "COMMAND");
    out.push_str(line.trim_end());
    out.push('\n');

    let command_width = width.saturating_sub(COMMAND_COLUMN);
    for process in snapshot.processes.top(rows) {
        line.clear();
        push_column(&mut line, PID_COLUMN, &process.pid.to_string());
        push_column(&mut line, USER_COLUMN, truncate(&process.user, CPU_COLUMN - USER_COLUMN - 1));
        push_column(
            &mut line,
            CPU_COLUMN,
            &format!("{:.1}", process.cpu_utilization * 100.0),
        );
        push_column(&mut line, RAM_COLUMN, &process.ram());
        push_column(&mut line, TIME_COLUMN, &elapsed_time(process.uptime_seconds));
        push_column(&mut line, COMMAND_COLUMN, truncate(&process.command, command_width));
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// 补齐空格到 `column` 后写入文本，已超出时至少留一个空格
fn push_column(line: &mut String, column: usize, text: &str) {
    let current = line.chars().count();
    if current < column {
        line.extend(std::iter::repeat_n(' ', column - current));
    } else if current > 0 {
        line.push(' ');
    }
    line.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessSnapshot, ProcessTable};

    fn create_test_snapshot() -> SystemSnapshot {
        SystemSnapshot {
            os_name: "Test Linux 1.0".to_string(),
            kernel: "6.6.7-test".to_string(),
            cpu_utilization: 0.3,
            memory_utilization: 0.35,
            uptime_seconds: 3661,
            total_processes: 4242,
            running_processes: 3,
            processes: ProcessTable::from_snapshots(vec![
                ProcessSnapshot {
                    pid: 1,
                    command: "/sbin/init splash".to_string(),
                    uid: "0".to_string(),
                    user: "root".to_string(),
                    vm_size_kb: Some(204800),
                    uptime_seconds: 3600,
                    cpu_utilization: 0.015,
                    ..Default::default()
                },
                ProcessSnapshot {
                    pid: 4321,
                    command: "cargo build --release --workspace".to_string(),
                    uid: "1000".to_string(),
                    user: "alice".to_string(),
                    vm_size_kb: Some(1_500_000),
                    uptime_seconds: 75,
                    cpu_utilization: 0.875,
                    ..Default::default()
                },
                ProcessSnapshot {
                    pid: 2,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_header() {
        let text = render_text(&create_test_snapshot(), 10, 120);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "OS: Test Linux 1.0");
        assert_eq!(lines[1], "Kernel: 6.6.7-test");
        assert!(lines[2].starts_with("CPU:    0%"));
        assert!(lines[2].ends_with(" 30.0/100%"));
        assert!(lines[3].ends_with(" 35.0/100%"));
        assert_eq!(lines[4], "Total Processes: 4242");
        assert_eq!(lines[5], "Running Processes: 3");
        assert_eq!(lines[6], "Up Time: 01:01:01");
        assert_eq!(lines[7], "");
        assert_eq!(
            lines[8],
            "PID    USER     CPU[%]  RAM[MB]  TIME+      COMMAND"
        );
    }

    #[test]
    fn test_render_process_rows() {
        let text = render_text(&create_test_snapshot(), 10, 120);
        let rows: Vec<&str> = text.lines().skip(9).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            "4321   alice    87.5    1500     00:01:15   cargo build --release --workspace"
        );
        assert_eq!(
            rows[1],
            "1      root     1.5     204      01:00:00   /sbin/init splash"
        );
        // 已退出的进程只剩默认字段
        assert_eq!(rows[2], "2               0.0              00:00:00");
    }

    #[test]
    fn test_render_limits_rows_and_width() {
        let text = render_text(&create_test_snapshot(), 1, 50);
        let rows: Vec<&str> = text.lines().skip(9).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with("00:01:15   cargo"));
        assert!(!text.contains("/sbin/init"));
    }

    #[test]
    fn test_render_empty_table() {
        let text = render_text(&SystemSnapshot::default(), 10, 120);
        assert_eq!(text.lines().count(), 9);
        assert!(text.contains("Up Time: 00:00:00"));
    }

    #[test]
    fn test_push_column_overflow() {
        let mut line = String::from("a-very-long-user");
        push_column(&mut line, 7, "x");
        assert_eq!(line, "a-very-long-user x");
    }
}

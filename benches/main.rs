use criterion::{Criterion, black_box, criterion_group, criterion_main};
use swb_proc_monitor::display::render_text;
use swb_proc_monitor::parser::{self, MetricsParser};
use swb_proc_monitor::process::{ProcessSnapshot, ProcessTable};
use swb_proc_monitor::source::{MockSource, ProcFs, StatFile};
use swb_proc_monitor::system::{System, SystemSnapshot};

const MEMINFO: &str = "MemTotal:       16318480 kB\n\
MemFree:         1228380 kB\n\
MemAvailable:    9874512 kB\n\
Buffers:          612344 kB\n\
Cached:          7801236 kB\n\
SwapCached:            0 kB\n\
Active:          6489212 kB\n\
Inactive:        6947556 kB\n";

const STAT: &str = "cpu  2255349 3421 658447 67232445 77213 0 18232 0 0 0\n\
cpu0 282016 434 82204 8403178 9610 0 7711 0 0 0\n\
intr 165487213 9 0 0 0\n\
ctxt 346123587\n\
btime 1700000000\n\
processes 1834221\n\
procs_running 2\n\
procs_blocked 0\n";

const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
alice:x:1000:1000:Alice:/home/alice:/bin/zsh\n";

fn stat_line(pid: u32, utime: u64, starttime: u64) -> String {
    format!(
        "{pid} (worker {pid}) S 1 {pid} {pid} 0 -1 4194560 1000 0 0 0 {utime} 100 0 0 20 0 1 0 {starttime} 10485760 500 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
    )
}

/// 构造一个有 `count` 个进程的数据源
fn create_test_source(count: u32) -> MockSource {
    let mut source = MockSource::new()
        .with_file(StatFile::OsRelease, "PRETTY_NAME=\"Bench Linux\"\n")
        .with_file(StatFile::Version, "Linux version 6.6.0 (gcc) #1 SMP\n")
        .with_file(StatFile::MemInfo, MEMINFO)
        .with_file(StatFile::Stat, STAT)
        .with_file(StatFile::Uptime, "35129.58 138219.31\n")
        .with_file(StatFile::Passwd, PASSWD);
    for pid in 1..=count {
        let status = format!("Name:\tworker\nUid:\t1000\t1000\t1000\t1000\nVmSize:\t{} kB\n", pid * 1024);
        source = source.with_process(
            pid,
            &stat_line(pid, u64::from(pid) * 37 % 5000, u64::from(pid) * 100),
            &status,
            "/usr/bin/worker\0--id\0",
        );
    }
    source
}

fn bench_parsing(c: &mut Criterion) {
    c.bench_function("parse_meminfo", |b| {
        b.iter(|| {
            let info = parser::parse_meminfo(black_box(MEMINFO));
            let _ = black_box(info);
        })
    });

    c.bench_function("parse_cpu_counters", |b| {
        b.iter(|| {
            let counters = parser::parse_cpu_counters(black_box(STAT));
            let _ = black_box(counters);
        })
    });

    let line = stat_line(4242, 1234, 56789);
    c.bench_function("parse_proc_stat", |b| {
        b.iter(|| {
            let times = parser::parse_proc_stat(black_box(&line));
            let _ = black_box(times);
        })
    });

    let users = parser::UserDb::new(PASSWD);
    c.bench_function("resolve_user", |b| {
        b.iter(|| {
            let name = users.resolve(black_box("1000"));
            black_box(name);
        })
    });
}

fn bench_process_table(c: &mut Criterion) {
    let snapshots: Vec<ProcessSnapshot> = (0..1000)
        .map(|pid| ProcessSnapshot {
            pid,
            cpu_utilization: (pid * 7919 % 1000) as f32 / 1000.0,
            ..Default::default()
        })
        .collect();

    c.bench_function("process_table_sort_1000", |b| {
        b.iter(|| {
            let table = ProcessTable::from_snapshots(black_box(snapshots.clone()));
            black_box(table);
        })
    });

    let parser = MetricsParser::with_clock_ticks(create_test_source(500), 100);
    c.bench_function("process_table_build_500", |b| {
        b.iter(|| {
            let table = ProcessTable::build(black_box(&parser));
            black_box(table);
        })
    });
}

fn bench_rendering(c: &mut Criterion) {
    let system = System::with_parser(MetricsParser::with_clock_ticks(create_test_source(200), 100));
    let snapshot = system.snapshot();

    c.bench_function("render_text", |b| {
        b.iter(|| {
            let text = render_text(black_box(&snapshot), 10, 120);
            black_box(text);
        })
    });

    c.bench_function("render_text_empty", |b| {
        let empty = SystemSnapshot::default();
        b.iter(|| {
            let text = render_text(black_box(&empty), 10, 120);
            black_box(text);
        })
    });
}

fn bench_live_snapshot(c: &mut Criterion) {
    let system = System::new(ProcFs::default());

    c.bench_function("live_system_snapshot", |b| {
        b.iter(|| {
            let snapshot = system.snapshot();
            black_box(snapshot);
        })
    });
}

criterion_group!(
    benches,
    bench_parsing,
    bench_process_table,
    bench_rendering,
    bench_live_snapshot
);
criterion_main!(benches);

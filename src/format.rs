//! 显示用的文本格式化

/// 进度条的格数，每格代表 2%
pub const BAR_WIDTH: usize = 50;

/// 秒数转为 `HH:MM:SS`，小时数超过 99 时照常增长
pub fn elapsed_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = seconds / 60 % 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// 形如 `0%|||||     12.3/100%` 的进度条
pub fn progress_bar(fraction: f32) -> String {
    let clamped = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((clamped * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);

    let mut bar = String::with_capacity(BAR_WIDTH + 16);
    bar.push_str("0%");
    bar.extend(std::iter::repeat_n('|', filled));
    bar.extend(std::iter::repeat_n(' ', BAR_WIDTH - filled));
    bar.push_str(&format!(" {:5.1}/100%", clamped * 100.0));
    bar
}

/// 按字符截断到 `width` 个字符
pub fn truncate(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

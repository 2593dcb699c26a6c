//! 进度上报与 CLI 进度条管理。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::ProgressSnapshot;

const MB: f64 = 1024.0 * 1024.0;

pub type ProgressCallback = Box<dyn FnMut(ProgressSnapshot) + Send>;

/// 下载进度的观察者：可选 UI 回调 + 可选终端进度条。只读取快照，不持有下载状态。
pub struct ProgressReporter {
    cb: Option<ProgressCallback>,
    label: Option<String>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn silent() -> Self {
        Self {
            cb: None,
            label: None,
            bar: None,
        }
    }

    pub fn with_callback(cb: ProgressCallback) -> Self {
        Self {
            cb: Some(cb),
            label: None,
            bar: None,
        }
    }

    /// 在 stderr 上显示进度条，`label` 一般是画质标签。
    pub fn cli(label: &str) -> Self {
        Self {
            cb: None,
            label: Some(label.to_string()),
            bar: None,
        }
    }

    pub(crate) fn begin(&mut self, expected: Option<u64>) {
        let Some(label) = self.label.as_deref() else {
            return;
        };

        let bar = match expected {
            Some(total) if total > 0 => {
                let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
                bar.set_style(
                    ProgressStyle::with_template("{prefix} | {bar:40.cyan/blue} {percent}% | {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("##-"),
                );
                bar
            }
            _ => {
                let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
                bar.set_style(
                    ProgressStyle::with_template("{prefix} {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_prefix(label.to_string());
        bar.set_message(status_line(&ProgressSnapshot {
            received_bytes: 0,
            expected_bytes: expected,
            elapsed: Default::default(),
        }));
        self.bar = Some(bar);
    }

    pub(crate) fn emit(&mut self, snapshot: ProgressSnapshot) {
        if let Some(bar) = self.bar.as_ref() {
            bar.set_position(snapshot.received_bytes);
            bar.set_message(status_line(&snapshot));
            if snapshot.expected_bytes.is_none() {
                bar.tick();
            }
        }
        if let Some(cb) = self.cb.as_mut() {
            cb(snapshot);
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    pub(crate) fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

/// `已下载/总计 MB | 速度 MB/s`，总计未知时只显示已下载量。
pub fn status_line(snapshot: &ProgressSnapshot) -> String {
    let done = snapshot.received_bytes as f64 / MB;
    let speed = snapshot.bytes_per_sec().unwrap_or(0.0) / MB;
    match snapshot.expected_bytes {
        Some(total) if total > 0 => {
            format!("{done:.1}/{:.1} MB | {speed:.2} MB/s", total as f64 / MB)
        }
        _ => format!("{done:.1} MB | {speed:.2} MB/s"),
    }
}

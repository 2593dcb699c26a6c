//! 下载相关的数据模型定义。
//!
//! 包含候选视频、输出模式、下载会话与进度快照、后处理结果等核心数据结构。

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

/// 元数据里给出的画质提示，用于推导画质标签。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityHint {
    pub quality: Option<String>,
    pub height: Option<u32>,
    pub bitrate: Option<u64>,
}

/// 探测前的候选项：只有地址与画质提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStub {
    pub url: String,
    pub hint: QualityHint,
}

/// 探测后的候选视频，字段只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaCandidate {
    source_url: String,
    quality_label: String,
    size_bytes: Option<u64>,
}

impl MediaCandidate {
    pub(crate) fn new(source_url: String, quality_label: String, size_bytes: Option<u64>) -> Self {
        Self {
            source_url,
            quality_label,
            size_bytes,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn quality_label(&self) -> &str {
        &self.quality_label
    }

    /// None 表示探测失败或服务端未给出长度。
    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Mode {
    /// 原样保存（带声音的 MP4）
    #[value(name = "audio")]
    PassThrough,
    /// 去掉音轨（无声 MP4）
    #[value(name = "silent")]
    StripAudio,
    /// 仅提取音频（MP3）
    #[value(name = "mp3")]
    ExtractAudio,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::PassThrough, Mode::StripAudio, Mode::ExtractAudio];

    pub fn extension(self) -> &'static str {
        match self {
            Mode::ExtractAudio => "mp3",
            Mode::PassThrough | Mode::StripAudio => "mp4",
        }
    }

    /// 写进文件名的类型标签。
    pub fn file_label(self) -> &'static str {
        match self {
            Mode::PassThrough => "Sound",
            Mode::StripAudio => "Silent",
            Mode::ExtractAudio => "MP3",
        }
    }

    pub fn menu_title(self) -> &'static str {
        match self {
            Mode::PassThrough => "有声视频 (MP4)",
            Mode::StripAudio => "无声视频 (MP4)",
            Mode::ExtractAudio => "仅音频 (MP3)",
        }
    }

    pub fn needs_transcoder(self) -> bool {
        !matches!(self, Mode::PassThrough)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::PassThrough => "pass-through",
            Mode::StripAudio => "strip-audio",
            Mode::ExtractAudio => "extract-audio",
        };
        f.write_str(name)
    }
}

/// 单次下载的会话状态。`received_bytes` 只能通过 [`DownloadSession::record_chunk`] 增长。
#[derive(Debug)]
pub struct DownloadSession {
    source_url: String,
    destination: PathBuf,
    expected_bytes: Option<u64>,
    received_bytes: u64,
    started_at: Instant,
}

impl DownloadSession {
    pub(crate) fn start(source_url: &str, destination: &Path, expected_bytes: Option<u64>) -> Self {
        Self {
            source_url: source_url.to_string(),
            destination: destination.to_path_buf(),
            expected_bytes,
            received_bytes: 0,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_chunk(&mut self, len: usize) -> ProgressSnapshot {
        self.received_bytes = self.received_bytes.saturating_add(len as u64);
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.started_at.elapsed())
    }

    fn snapshot_at(&self, elapsed: Duration) -> ProgressSnapshot {
        ProgressSnapshot {
            received_bytes: self.received_bytes,
            expected_bytes: self.expected_bytes,
            elapsed,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn expected_bytes(&self) -> Option<u64> {
        self.expected_bytes
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub received_bytes: u64,
    pub expected_bytes: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// 0-100；总大小未知时为 None。
    pub fn percent(&self) -> Option<f64> {
        match self.expected_bytes {
            Some(total) if total > 0 => {
                Some((self.received_bytes as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }

    /// 自开始以来的平均速度（字节/秒）。耗时为 0 时不计算。
    // TODO: 换成最近几秒的滑动窗口，速度突变时显示会更及时
    pub fn bytes_per_sec(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.received_bytes as f64 / secs)
    }
}

/// 后处理结果，每次运行只产生一次。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessResult {
    pub output_path: PathBuf,
    pub succeeded: bool,
    /// 外部进程的退出码；直接复制时为 None
    pub exit_signal: Option<i32>,
}

//! 下载流程的错误类型。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::models::Mode;

/// 单次流式下载中的失败。
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("读取数据流中断: {0}")]
    Stream(#[source] io::Error),
    #[error("写入临时文件失败: {0}")]
    Write(#[source] io::Error),
}

/// 整条流水线的致命错误；探测失败不在此列（降级为未知大小）。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InputInvalid(String),
    #[error("获取帖子信息失败: {0}")]
    MetadataUnavailable(String),
    #[error("{url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: DownloadError,
    },
    #[error("找不到可用的 ffmpeg: {0}")]
    TranscoderUnavailable(String),
    #[error("{mode} 处理时 ffmpeg 退出码 {}", exit_code_text(.exit_code))]
    PostProcessFailed {
        mode: Mode,
        exit_code: Option<i32>,
        output: PathBuf,
    },
    #[error("{action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// 失败阶段的名称，用于给用户的单行失败提示。
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::InputInvalid(_) => "输入校验",
            PipelineError::MetadataUnavailable(_) => "获取帖子信息",
            PipelineError::DownloadFailed { .. } => "下载",
            PipelineError::TranscoderUnavailable(_) => "准备转码",
            PipelineError::PostProcessFailed { .. } => "后处理",
            PipelineError::Filesystem { .. } => "文件操作",
        }
    }
}

fn exit_code_text(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "未知（被信号终止）".to_string())
}

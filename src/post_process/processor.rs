//! 按模式把下载好的临时文件变成最终输出。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::transcoder::{Transcoder, extract_audio_args, strip_audio_args};
use crate::download::errors::PipelineError;
use crate::download::models::{Mode, PostProcessResult};

/// 返回时外部进程（若有）已经退出。
///
/// 转码失败（非零退出码）不是 `Err`，而是 `succeeded == false` 的结果；
/// `Err` 只表示文件系统错误或进程无法启动。
pub fn post_process(
    temp: &Path,
    destination: &Path,
    mode: Mode,
    transcoder: Option<&dyn Transcoder>,
) -> Result<PostProcessResult, PipelineError> {
    let args = match mode {
        Mode::PassThrough => {
            copy_atomically(temp, destination)?;
            info!(target: "post_process", dest = %destination.display(), "已复制原始视频");
            return Ok(PostProcessResult {
                output_path: destination.to_path_buf(),
                succeeded: true,
                exit_signal: None,
            });
        }
        Mode::StripAudio => strip_audio_args(temp, destination),
        Mode::ExtractAudio => extract_audio_args(temp, destination),
    };

    let transcoder = transcoder.ok_or_else(|| {
        PipelineError::TranscoderUnavailable(format!("{mode} 模式需要 ffmpeg"))
    })?;
    let outcome = transcoder
        .run(&args)
        .map_err(|e| PipelineError::TranscoderUnavailable(format!("无法启动 ffmpeg: {e}")))?;

    if !outcome.success() {
        warn!(
            target: "post_process",
            %mode,
            exit_code = ?outcome.exit_code,
            tail = ?outcome.diagnostics.last(),
            "ffmpeg 处理失败"
        );
    }

    Ok(PostProcessResult {
        output_path: destination.to_path_buf(),
        succeeded: outcome.success(),
        exit_signal: outcome.exit_code,
    })
}

/// 先复制到同目录的 `.part`，再改名，目标文件要么完整出现要么不出现。
fn copy_atomically(src: &Path, dest: &Path) -> Result<(), PipelineError> {
    let part = part_path(dest);
    fs::copy(src, &part).map_err(|e| {
        let _ = fs::remove_file(&part);
        PipelineError::filesystem("复制", &part, e)
    })?;
    fs::rename(&part, dest).map_err(|e| {
        let _ = fs::remove_file(&part);
        PipelineError::filesystem("重命名", dest, e)
    })
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

//! 单次运行的编排：下载 → 后处理 → 收尾。
//!
//! 每次运行只有一个临时文件；无论哪种模式、成功与否，外部进程退出后都会删除它。
//! 唯一的例外是下载失败且配置了 `keep_partial_downloads`。

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::base_system::context::Config;
use crate::base_system::file_cleaner::TempArtifact;
use crate::post_process::finalize::{discard_temp, output_path};
use crate::post_process::processor::post_process;
use crate::post_process::transcoder::{FfmpegTranscoder, Transcoder};

use super::downloader::ProgressiveDownloader;
use super::errors::PipelineError;
use super::models::{MediaCandidate, Mode};
use super::progress::ProgressReporter;

const TEMP_PREFIX: &str = "tw-";
const TEMP_SUFFIX: &str = ".mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Downloading,
    PostProcessing(Mode),
    Finalized,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Downloading => f.write_str("downloading"),
            RunStage::PostProcessing(mode) => write!(f, "post-processing({mode})"),
            RunStage::Finalized => f.write_str("finalized"),
            RunStage::Failed => f.write_str("failed"),
        }
    }
}

/// 用户选定之后的一次运行。
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub post_id: String,
    pub candidate: MediaCandidate,
    pub mode: Mode,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalOutput {
    pub path: PathBuf,
    pub mode: Mode,
    pub received_bytes: u64,
}

/// 需要 ffmpeg 的模式会在下载之前先找好 ffmpeg，找不到就不下载。
pub fn execute(
    config: &Config,
    request: &RunRequest,
    reporter: &mut ProgressReporter,
) -> Result<FinalOutput, PipelineError> {
    let ffmpeg = if request.mode.needs_transcoder() {
        let ffmpeg = FfmpegTranscoder::resolve(config)?;
        info!(target: "pipeline", binary = %ffmpeg.binary().display(), "使用 ffmpeg");
        Some(ffmpeg)
    } else {
        None
    };

    let downloader = ProgressiveDownloader::new(&config.user_agent).map_err(|source| {
        PipelineError::DownloadFailed {
            url: request.candidate.source_url().to_string(),
            source,
        }
    })?;

    execute_with(
        config,
        request,
        &downloader,
        ffmpeg.as_ref().map(|t| t as &dyn Transcoder),
        &std::env::temp_dir(),
        reporter,
    )
}

pub(crate) fn execute_with(
    config: &Config,
    request: &RunRequest,
    downloader: &ProgressiveDownloader,
    transcoder: Option<&dyn Transcoder>,
    temp_dir: &Path,
    reporter: &mut ProgressReporter,
) -> Result<FinalOutput, PipelineError> {
    let result = run_stages(config, request, downloader, transcoder, temp_dir, reporter);
    if let Err(err) = &result {
        error!(
            target: "pipeline",
            stage = %RunStage::Failed,
            failed_at = err.stage(),
            error = %err,
            "运行失败"
        );
    }
    result
}

fn run_stages(
    config: &Config,
    request: &RunRequest,
    downloader: &ProgressiveDownloader,
    transcoder: Option<&dyn Transcoder>,
    temp_dir: &Path,
    reporter: &mut ProgressReporter,
) -> Result<FinalOutput, PipelineError> {
    fs::create_dir_all(&request.output_dir)
        .map_err(|e| PipelineError::filesystem("创建输出目录", &request.output_dir, e))?;
    let temp = TempArtifact::create_in(temp_dir, TEMP_PREFIX, TEMP_SUFFIX)
        .map_err(|e| PipelineError::filesystem("创建临时文件", temp_dir, e))?;

    enter(RunStage::Downloading);
    let url = request.candidate.source_url();
    let session = match downloader.download(url, temp.path(), reporter) {
        Ok(session) => session,
        Err(source) => {
            abandon_partial(config, temp);
            return Err(PipelineError::DownloadFailed {
                url: url.to_string(),
                source,
            });
        }
    };

    let destination = output_path(
        config,
        &request.output_dir,
        &request.post_id,
        request.candidate.quality_label(),
        request.mode,
    );

    enter(RunStage::PostProcessing(request.mode));
    let processed = post_process(temp.path(), &destination, request.mode, transcoder);
    // post_process 返回时子进程已退出，这里删临时文件不会和它冲突
    let cleanup = discard_temp(temp);
    let result = processed?;
    cleanup?;

    if !result.succeeded {
        return Err(PipelineError::PostProcessFailed {
            mode: request.mode,
            exit_code: result.exit_signal,
            output: result.output_path,
        });
    }

    enter(RunStage::Finalized);
    info!(
        target: "pipeline",
        source = session.source_url(),
        output = %result.output_path.display(),
        bytes = session.received_bytes(),
        "输出完成"
    );
    Ok(FinalOutput {
        path: result.output_path,
        mode: request.mode,
        received_bytes: session.received_bytes(),
    })
}

fn abandon_partial(config: &Config, temp: TempArtifact) {
    if config.keep_partial_downloads {
        let kept = temp.keep();
        warn!(target: "pipeline", path = %kept.display(), "保留未完成的临时文件");
        return;
    }
    if let Err(err) = discard_temp(temp) {
        warn!(target: "pipeline", error = %err, "清理未完成的临时文件失败");
    }
}

fn enter(stage: RunStage) {
    info!(target: "pipeline", %stage, "进入阶段");
}

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::base_system::context::{Config, safe_fs_name};
use crate::base_system::file_cleaner::TempArtifact;
use crate::download::errors::PipelineError;
use crate::download::models::Mode;
use crate::download::probe::UNKNOWN_QUALITY;

/// `{prefix}-{postId}_{quality}_{label}.{ext}`，截断只作用于主名部分，扩展名始终保留。
pub fn output_file_name(
    prefix: &str,
    post_id: &str,
    quality_label: &str,
    mode: Mode,
    max_len: usize,
) -> String {
    let quality: String = quality_label.chars().filter(|c| !c.is_whitespace()).collect();
    let quality = if quality.is_empty() {
        UNKNOWN_QUALITY
    } else {
        quality.as_str()
    };

    let ext = mode.extension();
    let stem = format!("{prefix}-{post_id}_{quality}_{}", mode.file_label());
    let stem_cap = max_len.saturating_sub(ext.len() + 1).max(1);
    format!("{}.{ext}", safe_fs_name(&stem, stem_cap))
}

pub fn output_path(
    config: &Config,
    output_dir: &Path,
    post_id: &str,
    quality_label: &str,
    mode: Mode,
) -> PathBuf {
    output_dir.join(output_file_name(
        &config.file_prefix,
        post_id,
        quality_label,
        mode,
        config.max_file_name_len,
    ))
}

/// 删除临时文件。调用时外部进程必须已经退出。
pub fn discard_temp(temp: TempArtifact) -> Result<(), PipelineError> {
    let path = temp.path().to_path_buf();
    match temp.discard() {
        Ok(true) => {
            debug!(target: "finalize", path = %path.display(), "已删除临时文件");
            Ok(())
        }
        Ok(false) => {
            warn!(target: "finalize", path = %path.display(), "临时文件已不存在");
            Ok(())
        }
        Err(e) => Err(PipelineError::filesystem("删除临时文件", path, e)),
    }
}

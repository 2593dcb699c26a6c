//! 下载前的准备：解析链接、拉取帖子元数据、探测候选视频。
//!
//! 产出 `PreparedPost`，供 UI 展示候选列表并让用户选择。

use tracing::{debug, info, warn};

use crate::base_system::context::Config;
use crate::base_system::post_ref::{PostRef, parse_post_ref};
use crate::network_parser::metadata::{MetadataClient, video_candidates};

use super::errors::PipelineError;
use super::models::MediaCandidate;
use super::probe::{HttpSizeProbe, probe_with};

/// 探测完成、等待用户选择的帖子。
#[derive(Debug, Clone)]
pub struct PreparedPost {
    pub post: PostRef,
    pub candidates: Vec<MediaCandidate>,
}

pub fn prepare(config: &Config, input: &str) -> Result<PreparedPost, PipelineError> {
    let post = parse_post_ref(input).map_err(|e| PipelineError::InputInvalid(e.to_string()))?;
    info!(
        target: "pipeline",
        url = %post.url,
        post_id = %post.post_id,
        path = %post.api_path,
        "解析链接完成"
    );

    let client = MetadataClient::new(&config.api_base, &config.user_agent, config.request_timeout())
        .map_err(|e| PipelineError::MetadataUnavailable(format!("初始化 HTTP 客户端失败: {e}")))?;
    let meta = client.fetch(&post.api_path)?;
    let stubs = video_candidates(&meta)?;
    info!(target: "probe", count = stubs.len(), "开始探测候选视频大小");

    let candidates = match HttpSizeProbe::new(&config.user_agent, config.probe_timeout()) {
        Ok(probe) => probe.probe(stubs),
        Err(err) => {
            // 探测只影响显示，客户端建不起来就全部按未知处理
            warn!(target: "probe", error = %err, "无法创建探测客户端，大小全部未知");
            probe_with(stubs, |_| None)
        }
    };

    let known = candidates.iter().filter(|c| c.size_bytes().is_some()).count();
    info!(target: "probe", total = candidates.len(), known, "探测完成");
    debug!(
        target: "probe",
        candidates = %serde_json::to_string(&candidates).unwrap_or_default(),
        "候选视频"
    );

    Ok(PreparedPost { post, candidates })
}

impl PreparedPost {
    /// 1 开始的序号；越界返回 None。
    pub fn candidate(&self, index: usize) -> Option<&MediaCandidate> {
        index.checked_sub(1).and_then(|i| self.candidates.get(i))
    }
}

//! 帖子元数据接口：拉取 JSON，筛出视频类型的媒体条目。

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::download::errors::PipelineError;
use crate::download::models::{CandidateStub, QualityHint};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMetadata {
    #[serde(default)]
    pub media_extended: Option<Vec<MediaEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub bitrate: Option<u64>,
}

impl MediaEntry {
    fn is_video(&self) -> bool {
        self.kind == "video" && !self.url.trim().is_empty()
    }
}

pub(crate) struct MetadataClient {
    client: Client,
    api_base: String,
}

impl MetadataClient {
    pub(crate) fn new(api_base: &str, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn endpoint(&self, api_path: &str) -> String {
        format!("{}/{}", self.api_base, api_path.trim_start_matches('/'))
    }

    pub(crate) fn fetch(&self, api_path: &str) -> Result<PostMetadata, PipelineError> {
        let url = self.endpoint(api_path);
        debug!(target: "metadata", %url, "请求帖子元数据");

        let resp = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::MetadataUnavailable(e.to_string()))?;

        resp.json::<PostMetadata>()
            .map_err(|e| PipelineError::MetadataUnavailable(format!("解析响应失败: {e}")))
    }
}

/// 取出所有视频条目；一个都没有时视为输入无效。
pub fn video_candidates(meta: &PostMetadata) -> Result<Vec<CandidateStub>, PipelineError> {
    let stubs: Vec<CandidateStub> = meta
        .media_extended
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|m| m.is_video())
        .map(|m| CandidateStub {
            url: m.url.trim().to_string(),
            hint: QualityHint {
                quality: m.quality.clone(),
                height: m.height,
                bitrate: m.bitrate,
            },
        })
        .collect();

    if stubs.is_empty() {
        return Err(PipelineError::InputInvalid("这个帖子里没有视频".to_string()));
    }
    Ok(stubs)
}

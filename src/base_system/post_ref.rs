//! 帖子链接解析：提取帖子 ID 与元数据 API 所需的路径。

use regex::Regex;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static RE_STATUS_ID: OnceLock<Regex> = OnceLock::new();

fn re_status_id() -> &'static Regex {
    RE_STATUS_ID.get_or_init(|| Regex::new(r"status/(\d+)").expect("compile RE_STATUS_ID"))
}

const HOST_MARKERS: [&str; 2] = ["x.com/", "twitter.com/"];

/// 规范化后的帖子引用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    /// 原始链接（已去除首尾空白）
    pub url: String,
    /// 帖子数字 ID；链接中没有时为当前毫秒时间戳
    pub post_id: String,
    /// 主机名之后的路径，例如 `user/status/123`
    pub api_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostRefError {
    #[error("链接必须以 http 开头")]
    NotHttp,
    #[error("无法识别的帖子链接（需要 x.com 或 twitter.com）")]
    UnknownHost,
}

pub fn parse_post_ref(input: &str) -> Result<PostRef, PostRefError> {
    let url = input.trim();
    if !url.starts_with("http") {
        return Err(PostRefError::NotHttp);
    }

    let api_path = HOST_MARKERS
        .iter()
        .find_map(|marker| url.split_once(marker).map(|(_, rest)| rest))
        .map(|rest| rest.trim_matches('/'))
        .filter(|rest| !rest.is_empty())
        .ok_or(PostRefError::UnknownHost)?;

    let post_id = re_status_id()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(fallback_id);

    Ok(PostRef {
        url: url.to_string(),
        post_id,
        api_path: api_path.to_string(),
    })
}

fn fallback_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

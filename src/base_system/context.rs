//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及文件名清理。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 保存配置
    #[serde(default)]
    pub output_dir: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_max_file_name_len")]
    pub max_file_name_len: usize,
    #[serde(default = "default_false")]
    pub keep_partial_downloads: bool,

    // 网络配置
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 转码配置
    #[serde(default)]
    pub ffmpeg_path: String,
    #[serde(default = "default_true")]
    pub show_ffmpeg_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            file_prefix: default_file_prefix(),
            max_file_name_len: default_max_file_name_len(),
            keep_partial_downloads: default_false(),
            api_base: default_api_base(),
            request_timeout: default_request_timeout(),
            probe_timeout: default_probe_timeout(),
            user_agent: default_user_agent(),
            ffmpeg_path: String::new(),
            show_ffmpeg_output: default_true(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 10] = [
            FieldMeta {
                name: "output_dir",
                description: "保存目录（留空则使用系统“下载”目录）",
            },
            FieldMeta {
                name: "file_prefix",
                description: "输出文件名前缀",
            },
            FieldMeta {
                name: "max_file_name_len",
                description: "输出文件名最大长度（字节）",
            },
            FieldMeta {
                name: "keep_partial_downloads",
                description: "下载失败时是否保留未完成的临时文件",
            },
            FieldMeta {
                name: "api_base",
                description: "帖子元数据 API 地址",
            },
            FieldMeta {
                name: "request_timeout",
                description: "元数据请求超时时间（秒）",
            },
            FieldMeta {
                name: "probe_timeout",
                description: "文件大小探测超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "HTTP User-Agent",
            },
            FieldMeta {
                name: "ffmpeg_path",
                description: "ffmpeg 可执行文件路径（留空则在 PATH 中查找）",
            },
            FieldMeta {
                name: "show_ffmpeg_output",
                description: "是否在控制台显示 ffmpeg 输出",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_output_dir(&self) -> PathBuf {
        if !self.output_dir.trim().is_empty() {
            return PathBuf::from(self.output_dir.trim());
        }
        dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout.max(1))
    }
}

const FALLBACK_NAME: &str = "unnamed";

/// 去掉文件系统不允许的字符，并按字节数截断（不会切断多字节字符）。
pub fn safe_fs_name(name: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .filter(|ch| !matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|ch| (*ch as u32) >= 32)
        .collect();

    if cleaned.len() > max_len {
        let mut end = max_len;
        while end > 0 && !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    while cleaned.ends_with(' ') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str(&FALLBACK_NAME[..FALLBACK_NAME.len().min(max_len)]);
    }

    cleaned
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_file_prefix() -> String {
    "TXJS".to_string()
}

fn default_max_file_name_len() -> usize {
    100
}

fn default_api_base() -> String {
    "https://api.vxtwitter.com".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_forbidden_characters() {
        assert_eq!(
            safe_fs_name("TXJS-1_<720p>:\"a/b\\c|d?e*.mp4", 100),
            "TXJS-1_720pabcde.mp4"
        );
    }

    #[test]
    fn truncates_on_char_boundary() {
        let name = "视频".repeat(10);
        let out = safe_fs_name(&name, 7);
        assert_eq!(out, "视频");
        assert!(out.len() <= 7);
    }

    #[test]
    fn empty_result_falls_back() {
        assert_eq!(safe_fs_name("???", 100), "unnamed");
        assert_eq!(safe_fs_name("???", 3), "unn");
        assert!(safe_fs_name("   ", 1).len() <= 1);
    }

    #[test]
    fn explicit_output_dir_wins() {
        let cfg = Config {
            output_dir: " /tmp/videos ".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.default_output_dir(), PathBuf::from("/tmp/videos"));
    }

    #[test]
    fn field_table_matches_serialized_keys() {
        let value = serde_yaml::to_value(Config::default()).unwrap();
        let serde_yaml::Value::Mapping(map) = value else {
            panic!("config must be a mapping");
        };
        assert_eq!(map.len(), Config::fields().len());
        for field in Config::fields() {
            assert!(map.contains_key(serde_yaml::Value::String(field.name.to_string())));
        }
    }
}

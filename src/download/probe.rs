//! 候选视频探测：并发 HEAD 请求获取文件大小，并生成画质标签。
//!
//! 单个候选探测失败只会让它的大小变成未知，不影响其他候选，也不会向上返回错误。

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use super::models::{CandidateStub, MediaCandidate, QualityHint};

pub const UNKNOWN_QUALITY: &str = "unknown";

/// 画质标签：显式标签 > `{height}p` > `{bitrate/1000}kbps` > unknown。
pub fn quality_label(hint: &QualityHint) -> String {
    if let Some(q) = hint.quality.as_deref().map(str::trim)
        && !q.is_empty()
    {
        return q.to_string();
    }
    if let Some(height) = hint.height {
        return format!("{height}p");
    }
    if let Some(bitrate) = hint.bitrate {
        return format!("{}kbps", bitrate / 1000 + u64::from(bitrate % 1000 >= 500));
    }
    UNKNOWN_QUALITY.to_string()
}

pub(crate) struct HttpSizeProbe {
    client: Client,
}

impl HttpSizeProbe {
    pub(crate) fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// HEAD 请求读取 Content-Length；任何失败都返回 None。
    pub(crate) fn content_length(&self, url: &str) -> Option<u64> {
        let resp = match self.client.head(url).send().and_then(|r| r.error_for_status()) {
            Ok(resp) => resp,
            Err(err) => {
                debug!(target: "probe", %url, error = %err, "大小探测失败");
                return None;
            }
        };
        // HEAD 响应没有 body，不能用 resp.content_length()
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
    }

    pub(crate) fn probe(&self, stubs: Vec<CandidateStub>) -> Vec<MediaCandidate> {
        probe_with(stubs, |url| self.content_length(url))
    }
}

/// 每个候选一个线程并发探测；输出与输入等长且顺序一致。
pub fn probe_with<F>(stubs: Vec<CandidateStub>, size_of: F) -> Vec<MediaCandidate>
where
    F: Fn(&str) -> Option<u64> + Sync,
{
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, Option<u64>)>();

    thread::scope(|scope| {
        for (idx, stub) in stubs.iter().enumerate() {
            let tx = tx.clone();
            let size_of = &size_of;
            scope.spawn(move || {
                let _ = tx.send((idx, size_of(&stub.url)));
            });
        }
    });
    drop(tx);

    let mut sizes = vec![None; stubs.len()];
    for (idx, size) in rx.iter() {
        sizes[idx] = size;
    }

    stubs
        .into_iter()
        .zip(sizes)
        .map(|(stub, size)| MediaCandidate::new(stub.url, quality_label(&stub.hint), size))
        .collect()
}

/// 以 MB（1024*1024）显示，保留一位小数；未知时为 `?`。
pub fn format_size_mb(size: Option<u64>) -> String {
    match size {
        Some(bytes) => format!("{:.1}", bytes as f64 / 1024.0 / 1024.0),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, TestServer};
    use std::sync::Mutex;
    use std::time::Duration;

    fn stub(url: &str, hint: QualityHint) -> CandidateStub {
        CandidateStub {
            url: url.to_string(),
            hint,
        }
    }

    #[test]
    fn label_from_height() {
        let hint = QualityHint {
            height: Some(720),
            bitrate: Some(2_176_000),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&hint), "720p");
    }

    #[test]
    fn label_from_bitrate() {
        let hint = QualityHint {
            bitrate: Some(128_000),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&hint), "128kbps");

        let rounded = QualityHint {
            bitrate: Some(256_500),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&rounded), "257kbps");

        let huge = QualityHint {
            bitrate: Some(u64::MAX),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&huge), format!("{}kbps", u64::MAX / 1000 + 1));
    }

    #[test]
    fn explicit_tag_wins_and_blank_is_ignored() {
        let tagged = QualityHint {
            quality: Some("HD".to_string()),
            height: Some(720),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&tagged), "HD");

        let blank = QualityHint {
            quality: Some("  ".to_string()),
            height: Some(480),
            ..QualityHint::default()
        };
        assert_eq!(quality_label(&blank), "480p");
    }

    #[test]
    fn label_unknown_without_hints() {
        assert_eq!(quality_label(&QualityHint::default()), UNKNOWN_QUALITY);
    }

    #[test]
    fn failures_are_isolated_and_order_kept() {
        let stubs = vec![
            stub("a", QualityHint::default()),
            stub("fail", QualityHint::default()),
            stub("c", QualityHint::default()),
        ];
        let out = probe_with(stubs, |url| match url {
            "a" => {
                // 让第一个最后完成，确认结果不依赖完成顺序
                std::thread::sleep(Duration::from_millis(50));
                Some(1)
            }
            "c" => Some(3),
            _ => None,
        });

        assert_eq!(out.len(), 3);
        let urls: Vec<_> = out.iter().map(|c| c.source_url()).collect();
        assert_eq!(urls, ["a", "fail", "c"]);
        let sizes: Vec<_> = out.iter().map(|c| c.size_bytes()).collect();
        assert_eq!(sizes, [Some(1), None, Some(3)]);
    }

    #[test]
    fn probes_run_concurrently() {
        let in_flight = Mutex::new((0usize, 0usize));
        let stubs = (0..4)
            .map(|i| stub(&i.to_string(), QualityHint::default()))
            .collect();

        probe_with(stubs, |_| {
            {
                let mut g = in_flight.lock().unwrap();
                g.0 += 1;
                g.1 = g.1.max(g.0);
            }
            std::thread::sleep(Duration::from_millis(100));
            in_flight.lock().unwrap().0 -= 1;
            None
        });

        assert!(in_flight.lock().unwrap().1 > 1);
    }

    #[test]
    fn http_probe_reads_declared_length() {
        let server = TestServer::start(vec![
            ("/720.mp4", Route::file(&[7u8; 1234])),
            ("/chunked.mp4", Route::chunked(b"no length here")),
            ("/gone.mp4", Route::Status(500)),
        ]);
        let probe = HttpSizeProbe::new("ua", Duration::from_secs(5)).unwrap();

        let stubs = vec![
            stub(
                &server.url("/720.mp4"),
                QualityHint {
                    height: Some(720),
                    ..QualityHint::default()
                },
            ),
            stub(&server.url("/chunked.mp4"), QualityHint::default()),
            stub(&server.url("/gone.mp4"), QualityHint::default()),
            stub("http://127.0.0.1:1/unreachable.mp4", QualityHint::default()),
        ];
        let out = probe.probe(stubs);

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].size_bytes(), Some(1234));
        assert_eq!(out[0].quality_label(), "720p");
        assert_eq!(out[1].size_bytes(), None);
        assert_eq!(out[2].size_bytes(), None);
        assert_eq!(out[3].size_bytes(), None);
    }

    #[test]
    fn formats_sizes_in_mb() {
        assert_eq!(format_size_mb(Some(5 * 1024 * 1024 + 300 * 1024)), "5.3");
        assert_eq!(format_size_mb(None), "?");
    }
}

//! 流式下载：把单个地址的响应体边读边写进临时文件，同时上报进度。
//!
//! 每读到一块数据，写文件与更新计数在同一步完成；进度上报只读取已写入的字节数。
//! 出错时保留已写入的部分文件，由调用方决定是否删除。

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::models::DownloadSession;
use super::progress::ProgressReporter;

const CHUNK_SIZE: usize = 64 * 1024;

/// 按块读取的数据源。
pub(crate) struct Chunks<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: Read> Chunks<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0u8; CHUNK_SIZE],
        }
    }

    /// 下一块数据；`Ok(None)` 表示数据流正常结束。
    pub(crate) fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(n) => return Ok(Some(&self.buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct ProgressiveDownloader {
    client: Client,
}

impl ProgressiveDownloader {
    pub fn new(user_agent: &str) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        // 下载本身不设总超时，只限制建立连接的时间
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(15))
            .timeout(None)
            .build()?;

        Ok(Self { client })
    }

    /// 下载到 `destination`，只有数据流结束且文件已刷新关闭后才返回成功。
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        reporter: &mut ProgressReporter,
    ) -> Result<DownloadSession, DownloadError> {
        info!(target: "download", %url, dest = %destination.display(), "开始下载");

        let resp = self.client.get(url).send()?.error_for_status()?;
        let expected = declared_length(resp.headers());
        if expected.is_none() {
            debug!(target: "download", %url, "响应未声明长度，进度百分比不可用");
        }

        let file = File::create(destination).map_err(DownloadError::Write)?;
        let session = stream_to_file(url, resp, file, destination, expected, reporter)?;

        info!(
            target: "download",
            dest = %session.destination().display(),
            received = session.received_bytes(),
            expected = ?session.expected_bytes(),
            "下载完成"
        );
        Ok(session)
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

pub(crate) fn stream_to_file<R: Read>(
    source_url: &str,
    reader: R,
    file: File,
    destination: &Path,
    expected: Option<u64>,
    reporter: &mut ProgressReporter,
) -> Result<DownloadSession, DownloadError> {
    let mut session = DownloadSession::start(source_url, destination, expected);
    reporter.begin(expected);

    match copy_chunks(reader, file, &mut session, reporter) {
        Ok(()) => {
            reporter.finish();
            if let Some(total) = expected
                && total != session.received_bytes()
            {
                warn!(
                    target: "download",
                    declared = total,
                    received = session.received_bytes(),
                    "实际接收字节数与声明长度不一致"
                );
            }
            Ok(session)
        }
        Err(err) => {
            reporter.abandon();
            warn!(
                target: "download",
                received = session.received_bytes(),
                error = %err,
                "下载中断，保留部分文件"
            );
            Err(err)
        }
    }
}

fn copy_chunks<R: Read>(
    reader: R,
    file: File,
    session: &mut DownloadSession,
    reporter: &mut ProgressReporter,
) -> Result<(), DownloadError> {
    let mut chunks = Chunks::new(reader);
    let mut writer = BufWriter::new(file);

    while let Some(chunk) = chunks.next_chunk().map_err(DownloadError::Stream)? {
        writer.write_all(chunk).map_err(DownloadError::Write)?;
        let snapshot = session.record_chunk(chunk.len());
        reporter.emit(snapshot);
    }

    let file = writer
        .into_inner()
        .map_err(|e| DownloadError::Write(e.into_error()))?;
    file.sync_all().map_err(DownloadError::Write)?;
    drop(file);
    Ok(())
}

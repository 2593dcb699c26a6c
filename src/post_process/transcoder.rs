//! 外部转码进程（ffmpeg）的封装。
//!
//! 只以退出码判断成败；stderr 逐行转发到日志/控制台，不做解析。

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::base_system::context::Config;
use crate::download::errors::PipelineError;

const DIAGNOSTIC_TAIL: usize = 40;

/// 一次转码进程的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    /// 进程被信号终止时为 None
    pub exit_code: Option<i32>,
    /// stderr 最后若干行
    pub diagnostics: Vec<String>,
}

impl TranscodeOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait Transcoder {
    /// 运行到进程退出为止。返回时进程已结束，不再占用任何输入文件。
    fn run(&self, args: &[OsString]) -> io::Result<TranscodeOutcome>;
}

/// 仅保留视频流、直接复制不重新编码、不要音轨。
pub fn strip_audio_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
    args.extend(["-an", "-c:v", "copy", "-y"].map(OsString::from));
    args.push(output.into());
    args
}

/// 仅选择音轨，VBR 最高质量（`-q:a 0`）。
pub fn extract_audio_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
    args.extend(["-q:a", "0", "-map", "a", "-y"].map(OsString::from));
    args.push(output.into());
    args
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    echo: bool,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            binary: binary.into(),
            echo,
        }
    }

    /// 配置里指定了路径就直接用，否则在 PATH 中查找 `ffmpeg`。
    pub fn resolve(config: &Config) -> Result<Self, PipelineError> {
        let custom = config.ffmpeg_path.trim();
        if !custom.is_empty() {
            let path = PathBuf::from(custom);
            if !path.exists() {
                return Err(PipelineError::TranscoderUnavailable(format!(
                    "配置的 ffmpeg_path 不存在: {}",
                    path.display()
                )));
            }
            return Ok(Self::new(path, config.show_ffmpeg_output));
        }

        which::which("ffmpeg")
            .map(|path| Self::new(path, config.show_ffmpeg_output))
            .map_err(|e| PipelineError::TranscoderUnavailable(format!("PATH 中没有 ffmpeg ({e})")))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Transcoder for FfmpegTranscoder {
    fn run(&self, args: &[OsString]) -> io::Result<TranscodeOutcome> {
        info!(
            target: "post_process",
            binary = %self.binary.display(),
            args = %display_args(args),
            "启动 ffmpeg"
        );

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdout 单独排空，避免管道写满把进程卡住
        let stdout_drain = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let _ = io::copy(&mut out, &mut io::sink());
            })
        });

        let diagnostics = match child.stderr.take() {
            Some(err) => forward_lines(err, self.echo),
            None => Vec::new(),
        };

        if let Some(handle) = stdout_drain {
            let _ = handle.join();
        }
        let status = child.wait()?;
        debug!(target: "post_process", status = %status, "ffmpeg 已退出");

        Ok(TranscodeOutcome {
            exit_code: status.code(),
            diagnostics,
        })
    }
}

/// 读到 EOF 为止；非 UTF-8 内容按有损方式转换，不中断读取。
fn forward_lines<R: Read>(reader: R, echo: bool) -> Vec<String> {
    let mut reader = BufReader::new(reader);
    let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(target: "post_process", error = %e, "读取 ffmpeg stderr 失败，停止转发");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        if echo {
            eprintln!("{line}");
        }
        debug!(target: "post_process", "ffmpeg: {line}");
        if tail.len() == DIAGNOSTIC_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect()
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.as_os_str())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn strip_audio_is_video_only_stream_copy() {
        let args = strip_audio_args(Path::new("/tmp/tw-1.mp4"), Path::new("/out/a.mp4"));
        assert_eq!(
            strings(&args),
            ["-i", "/tmp/tw-1.mp4", "-an", "-c:v", "copy", "-y", "/out/a.mp4"]
        );
    }

    #[test]
    fn extract_audio_maps_audio_at_best_quality() {
        let args = extract_audio_args(Path::new("/tmp/tw-1.mp4"), Path::new("/out/a.mp3"));
        assert_eq!(
            strings(&args),
            ["-i", "/tmp/tw-1.mp4", "-q:a", "0", "-map", "a", "-y", "/out/a.mp3"]
        );
    }

    #[test]
    fn forward_lines_keeps_tail_and_survives_bad_utf8() {
        let mut input = Vec::new();
        for i in 0..(DIAGNOSTIC_TAIL + 5) {
            input.extend_from_slice(format!("line {i}\n").as_bytes());
        }
        input.extend_from_slice(b"bad \xff byte\n\n");

        let lines = forward_lines(io::Cursor::new(input), false);
        assert_eq!(lines.len(), DIAGNOSTIC_TAIL);
        assert_eq!(lines.last().unwrap(), "bad \u{fffd} byte");
        assert_eq!(lines[0], "line 6");
    }

    #[test]
    fn read_error_keeps_lines_seen_so_far() {
        struct BreaksAfterOneLine {
            sent: bool,
        }
        impl Read for BreaksAfterOneLine {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.sent {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
                }
                self.sent = true;
                let line = b"frame=1\n";
                buf[..line.len()].copy_from_slice(line);
                Ok(line.len())
            }
        }

        let lines = forward_lines(BreaksAfterOneLine { sent: false }, false);
        assert_eq!(lines, ["frame=1"]);
    }

    #[test]
    fn missing_custom_binary_is_reported() {
        let cfg = Config {
            ffmpeg_path: "/definitely/not/here/ffmpeg".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            FfmpegTranscoder::resolve(&cfg),
            Err(PipelineError::TranscoderUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_comes_from_the_process() {
        let ok = FfmpegTranscoder::new("true", false)
            .run(&["-i".into(), "x".into()])
            .unwrap();
        assert!(ok.success());

        let failed = FfmpegTranscoder::new("false", false).run(&[]).unwrap();
        assert!(!failed.success());
        assert_eq!(failed.exit_code, Some(1));
    }

    #[cfg(unix)]
    #[test]
    fn stderr_is_captured() {
        let outcome = FfmpegTranscoder::new("sh", false)
            .run(&["-c".into(), "echo to-out; echo oops >&2; exit 3".into()])
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.diagnostics, ["oops"]);
    }

    #[test]
    fn spawn_failure_is_an_io_error() {
        let err = FfmpegTranscoder::new("/no/such/ffmpeg-binary", false)
            .run(&[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

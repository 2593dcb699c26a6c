//! 命令行交互入口。
//!
//! 使用标准输入输出进行交互；命令行参数已给出的步骤不再询问。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::base_system::context::Config;
use crate::download::errors::PipelineError;
use crate::download::flow::{RunRequest, execute};
use crate::download::models::Mode;
use crate::download::plan::prepare;
use crate::download::progress::ProgressReporter;

mod download;

/// 命令行上预先给定的选择。
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub url: Option<String>,
    /// 1 开始的候选序号
    pub quality: Option<usize>,
    pub mode: Option<Mode>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Cancelled,
    Failed,
}

pub fn run(config: &Config, options: RunOptions) -> Result<Outcome> {
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.default_output_dir());

    let url = match options.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            let input = read_line(&format!(
                "请输入帖子链接（x.com / twitter.com，默认保存到 {}）：",
                output_dir.display()
            ))?;
            let input = input.trim();
            if input.is_empty() || input.eq_ignore_ascii_case("q") {
                println!("已取消。");
                return Ok(Outcome::Cancelled);
            }
            input.to_string()
        }
    };

    println!("正在获取帖子信息...");
    let prepared = match prepare(config, &url) {
        Ok(p) => p,
        Err(err) => {
            report_failure(err.stage(), &err);
            return Ok(Outcome::Failed);
        }
    };

    let candidate = match options.quality {
        Some(idx) => match prepared.candidate(idx) {
            Some(c) => {
                println!("{}", download::candidate_line(idx, c));
                c.clone()
            }
            None => {
                let reason = format!(
                    "画质序号 {idx} 超出范围（共 {} 个）",
                    prepared.candidates.len()
                );
                report_failure("输入校验", &reason);
                return Ok(Outcome::Failed);
            }
        },
        None => match download::pick_candidate(&prepared.candidates, read_line)? {
            Some(c) => c.clone(),
            None => {
                println!("已取消。");
                return Ok(Outcome::Cancelled);
            }
        },
    };

    let mode = match options.mode {
        Some(mode) => mode,
        None => match download::pick_mode(read_line)? {
            Some(mode) => mode,
            None => {
                println!("已取消。");
                return Ok(Outcome::Cancelled);
            }
        },
    };

    info!(
        target: "pipeline",
        post_id = %prepared.post.post_id,
        quality = candidate.quality_label(),
        %mode,
        "用户选择完成"
    );

    let label = candidate.quality_label().to_string();
    let request = RunRequest {
        post_id: prepared.post.post_id.clone(),
        candidate,
        mode,
        output_dir,
    };
    let mut reporter = ProgressReporter::cli(&label);
    match execute(config, &request, &mut reporter) {
        Ok(out) => {
            println!("完成 → {}", out.path.display());
            Ok(Outcome::Done)
        }
        Err(err) => {
            report_failure(err.stage(), &err);
            if let PipelineError::PostProcessFailed { output, .. } = &err
                && output.exists()
            {
                eprintln!("输出文件可能不完整: {}", output.display());
            }
            Ok(Outcome::Failed)
        }
    }
}

fn report_failure(stage: &str, err: &dyn std::fmt::Display) {
    eprintln!("{stage} 失败: {err}");
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

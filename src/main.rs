//! X / Twitter 帖子视频下载器。
//!
//! 本 crate 负责：解析帖子链接、拉取候选视频并探测大小、流式下载、按模式后处理（原样 / 去音轨 / 提取音频）。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/链接解析/临时文件等基础设施
//! - `network_parser`：帖子元数据接口
//! - `download`：探测、下载与整条流程编排
//! - `post_process`：ffmpeg 调用、输出命名与临时文件清理
//! - `ui`：命令行交互

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};

mod base_system;
mod download;
mod network_parser;
mod post_process;
#[cfg(test)]
mod test_support;
mod ui;

use base_system::config::load_or_create_in;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::models::Mode;
use tracing::info;
use ui::noui::{Outcome, RunOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "x-video-downloader")]
#[command(about = "下载 X / Twitter 帖子中的视频")]
struct Cli {
    /// 帖子链接；不提供时交互输入
    url: Option<String>,

    /// 画质序号（从 1 开始）；不提供时交互选择
    #[arg(long)]
    quality: Option<usize>,

    /// 保存方式；不提供时交互选择
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// 输出目录（覆盖配置中的 output_dir）
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("X Video Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref();
    let log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let config = load_or_create_in::<Config>(data_dir).map_err(|e| anyhow!(e.to_string()))?;

    let options = RunOptions {
        url: cli.url,
        quality: cli.quality,
        mode: cli.mode,
        output_dir: cli.output_dir,
    };

    let outcome = ui::noui::run(&config, options)?;
    if outcome == Outcome::Failed {
        log.safe_exit();
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: debug,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}

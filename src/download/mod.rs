//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（MediaCandidate / Mode / DownloadSession / ProgressSnapshot 等）
//! - `errors`      — 流水线与下载错误
//! - `probe`       — 候选视频并发大小探测与画质标签
//! - `progress`    — 进度上报与 CLI 进度条
//! - `downloader`  — 单个地址的流式下载
//! - `plan`        — 解析链接、拉元数据、探测候选
//! - `flow`        — 下载 → 后处理 → 收尾 的编排

pub mod downloader;
pub mod errors;
pub mod flow;
pub mod models;
pub mod plan;
pub mod probe;
pub mod progress;

//! 后处理：按模式生成最终文件，并负责命名与临时文件清理。

pub mod finalize;
pub mod processor;
pub mod transcoder;

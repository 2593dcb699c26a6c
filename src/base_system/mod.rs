pub mod config;
pub mod context;
pub mod file_cleaner;
pub mod logging;
pub mod post_ref;

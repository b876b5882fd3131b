pub mod config;
pub mod fileforge_toml;
pub mod format_bytes;
pub mod logger;
pub mod memory;

pub use config::*;
pub use fileforge_toml::{apply_file_to_opts, load_fileforge_toml, parse_fileforge_toml};
pub use format_bytes::{bytes_to_mb, format_bytes};
pub use logger::{Colors, setup_logging};
pub use memory::{MemorySampler, NoMemorySampler, SystemMemorySampler, default_budget};

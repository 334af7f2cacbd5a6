//! CLI command implementations.

mod config;
mod export;
mod list;
mod process;
mod profile;
mod rechunk;
mod recommend;
mod search;
mod serve;

pub use config::run_config;
pub use export::run_export;
pub use list::run_list;
pub use process::run_process;
pub use profile::run_profile;
pub use rechunk::run_rechunk;
pub use recommend::run_recommend;
pub use search::run_search;
pub use serve::run_serve;

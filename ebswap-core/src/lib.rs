pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod tags;
pub mod types;

pub use api::*;
pub use config::*;
pub use error::*;
pub use logging::{Console, LogLevel, init_logging};
pub use tags::{merge_tags, tag_set, writable_tags};
pub use types::*;

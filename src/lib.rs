pub mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod humanize;
pub mod nodes;
pub mod observability;
pub mod orchestrator;
pub mod placement;
pub mod publish;
pub mod request;
pub mod storage;

pub use error::{Error, ErrorKind, Result};

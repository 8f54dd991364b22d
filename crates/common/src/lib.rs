//! `mt-common`: shared types, configuration and errors for container
//! track discovery.
//!
//! - **Types**: `SampleAspectRatio`, `SamplePosition`
//! - **Formats**: `ContainerFormat`
//! - **Config**: `DemuxConfig` (serde, with defaults)
//! - **Errors**: `DemuxError` (thiserror-based)

pub mod codec;
pub mod config;
pub mod error;
pub mod types;

pub use codec::ContainerFormat;
pub use config::{DemuxConfig, DEFAULT_MAX_PAYLOAD_BYTES};
pub use error::{DemuxError, DemuxResult};
pub use types::{SampleAspectRatio, SamplePosition};

//! Configuration schema types for ringline.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod call;
mod client;
mod media;
mod relay;
mod system;

pub use call::*;
pub use client::*;
pub use media::*;
pub use relay::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration shared by the relay server and the call client.
///
/// Each binary reads the sections it needs and ignores the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct RinglineConfig {
    pub relay: RelayConfig,
    pub client: ClientConfig,
    pub call: CallConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

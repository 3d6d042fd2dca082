//! # Beacon Runtime
//!
//! Runtime orchestration for the Beacon bot host: configuration loading,
//! logging setup, adaptor selection, and the boot/shutdown sequence.
//!
//! ```rust,ignore
//! use beacon_runtime::BeaconRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BeaconRuntime::new().await?;
//!     runtime.install_fn("demo.echo", |ctx| Ok(Arc::new(Echo::new(ctx)) as _));
//!     runtime.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BeaconConfig, ConfigError, ConfigLoader, ConfigResult, ConnectionConfig, LogFormat, LogLevel,
    LogOutput, LoggingConfig, ReconnectConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
pub use runtime::{BeaconRuntime, RuntimeBuilder};

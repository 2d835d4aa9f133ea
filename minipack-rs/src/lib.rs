#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod loader;
pub mod resolver;
pub mod transform;

pub use compiler::Compiler;
pub use config::{BuildConfig, DEFAULT_CONFIG_FILE};
pub use emit::{emit, BundleEmit, BundleOptions};
pub use error::{BundleError, BundleResult};
pub use graph::{GraphBuilder, ModuleTable};
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use resolver::{resolve, ModuleId};
pub use serde_json;

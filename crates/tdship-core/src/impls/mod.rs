//! Impls - implementations of the ports.
//!
//! # Included
//! - **AwsCliPlatform**: runs the `aws` CLI (production)
//! - **InMemoryPlatform**: in-process platform (development / tests)

pub mod aws_cli;
pub mod inmem_platform;

pub use self::aws_cli::{AwsCliPlatform, AwsCliSettings};
pub use self::inmem_platform::{InMemoryPlatform, PlatformCall};

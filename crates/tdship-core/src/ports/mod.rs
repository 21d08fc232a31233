//! Ports - abstractions over the outside world.
//!
//! Each trait hides one external dependency so the deploy flow can be run
//! against an in-memory platform and a fixed clock in tests.

pub mod clock;
pub mod id_generator;
pub mod platform;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{RunIdGenerator, UlidGenerator};
pub use self::platform::{ContainerPlatform, PlatformError, PlatformOperation};

//! IdGenerator port - deploy run ids.
//!
//! `UlidGenerator` takes its timestamp from a `Clock`, so a `FixedClock`
//! pins the time component in tests.

use ulid::Ulid;

use crate::domain::DeployRunId;
use crate::ports::Clock;

/// RunIdGenerator hands out one DeployRunId per deploy batch.
pub trait RunIdGenerator: Send + Sync {
    fn generate_run_id(&self) -> DeployRunId;
}

/// ULID generator: clock timestamp + random bits.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> RunIdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> DeployRunId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        DeployRunId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generated_ids_are_unique() {
        let id_gen = UlidGenerator::new(SystemClock);
        let a = id_gen.generate_run_id();
        let b = id_gen.generate_run_id();
        assert_ne!(a, b);
    }

    #[test]
    fn fixed_clock_pins_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 58, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(at));

        let a = id_gen.generate_run_id();
        let b = id_gen.generate_run_id();

        // random part differs, timestamp part does not
        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
        assert_eq!(b.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
    }
}

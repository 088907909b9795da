//! Test helpers: float assertions and the YAML conformance fixtures
//!
//! Available under `cfg(test)` and with the `test-utils` feature.

pub mod assertions;
pub mod fixtures;

pub use assertions::{assert_approx_eq, assert_duration_in_range};
pub use fixtures::{
    fixtures_dir, load_fixture, FixtureError, ObservedStep, RateFixture, StandardRetryFixture,
};

//! Shared test utilities for the plateau-bldg workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Test data path helpers and skip macros for optional real PLATEAU files
//! - Synthetic CityGML documents and ZIP archives
//! - An in-process catalog and archive server
//! - Mesh and area-of-interest fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{citygml_document, BuildingSpec, TestServer};
//! ```

pub mod citygml;
pub mod fixtures;
pub mod paths;
pub mod server;

pub use citygml::*;
pub use fixtures::*;
pub use paths::*;
pub use server::TestServer;

/// Macro to skip a test if the required file is not found.
///
/// Real PLATEAU deliveries are large and not checked in; tests against them
/// return early when the file is absent.
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_real_tile() {
///     let path = require_test_file!("53394611_bldg_6697_op.gml");
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(35.6750001_f64, 35.675_f64, 1e-6); // passes
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(139.7625001, 139.7625, 1e-6);
        assert_approx_eq!(0.0, 0.0, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(35.68, 35.675, 0.001);
    }
}

//! Property-based test support for the AEC module.
//!
//! Provides stream layout and audio generators plus comparison utilities
//! for checking what comes out of the streaming loop.
//!
//! # Usage
//!
//! ```ignore
//! use aec_proptest::generators::*;
//! use test_strategy::proptest;
//!
//! #[proptest]
//! fn my_test(#[strategy(interleaved_i16(160, 2))] period: Vec<i16>) {
//!     assert_eq!(period.len(), 320);
//! }
//! ```

pub mod comparison;
pub mod generators;

pub use proptest;
pub use test_strategy;

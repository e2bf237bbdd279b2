//! Testing utilities and harness for Arbor

pub mod testing;

pub use testing::*;

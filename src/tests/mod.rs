//! Crate-level test suites.

mod helpers;
mod stress;

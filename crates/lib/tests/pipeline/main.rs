//! End-to-end tests of the build pipeline against a fake compiler.

mod build_tests;
mod common;
mod queue_tests;

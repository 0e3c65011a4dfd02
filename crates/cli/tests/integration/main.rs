//! CLI integration tests.

mod build_tests;
mod common;
mod deploy_tests;

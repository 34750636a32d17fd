//! Unit tests for risk manager components

pub mod config_tests;
pub mod stress_tests;

//! Unit tests for portfolio manager components

pub mod config_tests;

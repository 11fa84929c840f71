//! Command handler and binary tests

mod binary_tests;
mod parse_tests;
mod watch_tests;

// CLUSTERBENCH LIBRARY
// PURE-RUST CORE: PARSE, RUN, AGGREGATE, SWEEP, PERSIST.
// SHARED BETWEEN THE BINARY CRATE (main.rs, cli/) AND THE INTEGRATION TESTS.

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod event;
pub mod metrics;
pub mod runner;
pub mod sink;
pub mod sweep;

//! Scenario tests for graph construction, maintenance and persistence.

mod fixtures;
mod maintenance;

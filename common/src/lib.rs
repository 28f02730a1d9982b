//! Shared domain types for `sweepr`: address ranges, probe outcomes, host
//! records, the port catalog and run configuration.

pub mod catalog;
pub mod config;
pub mod network;

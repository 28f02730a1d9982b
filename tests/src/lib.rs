//! Workspace-level tests driving the scanner end to end with scripted
//! probers and connectors.

pub mod mocks;

mod loopback;
mod scan;

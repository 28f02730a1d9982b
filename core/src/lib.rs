//! Scanning engine behind `sweepr`: echo sweep, port probe and the
//! optional tracing, name resolution and export steps.

pub mod aggregate;
pub mod echo;
pub mod export;
pub mod network;
pub mod portscan;
pub mod resolver;
pub mod scanner;
pub mod sweep;
pub mod trace;

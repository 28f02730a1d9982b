pub mod host;
pub mod probe;
pub mod range;
pub mod target;

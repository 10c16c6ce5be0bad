//! Library components of the `labtrack` command line.

pub mod logging;
pub mod render;

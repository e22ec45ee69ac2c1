//! Tundra
//!
//! Settings loading and the command line front end for the tablet
//! connector. The binary either prints the table a configuration would
//! create (`plan`) or runs a write, scan and lookup round trip against an
//! in-process cluster (`demo`).

pub mod config;
pub mod demo;
pub mod plan;

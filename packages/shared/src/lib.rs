//! Utilities shared by the Madoguchi binaries and libraries.

pub mod logger;
pub mod time;

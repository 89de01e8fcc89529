//! Tools available to system actions

pub mod file;

pub use file::{FileTools, LocalFileTools, WRITE_OK};

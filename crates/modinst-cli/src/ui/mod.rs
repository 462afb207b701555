//! Console output.

pub mod diagnostics;
pub mod hooks;

pub mod completions;
pub mod install;
pub mod list;

pub mod cli;
pub mod load_config;
pub mod stores;
pub mod transport;

pub use cli::{run, Cli, Commands};

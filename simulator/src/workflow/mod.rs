pub mod config;
pub mod runner;

pub use config::ScenarioConfig;
pub use runner::Runner;

pub mod recon;
pub mod server;

pub use server::EngineServer;

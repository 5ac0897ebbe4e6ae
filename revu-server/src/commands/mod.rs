//! CLI command implementations

pub mod secrets;
pub mod serve;

pub use secrets::InitSecretsArgs;
pub use serve::ServeArgs;

//! Init-secrets command - Write a secrets template

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use revu_core::Secrets;

/// Arguments for the init-secrets command
#[derive(Args, Debug)]
pub struct InitSecretsArgs {
    /// Where to write the template (defaults to ~/.config/revu/secrets.toml)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl InitSecretsArgs {
    /// Execute the init-secrets command
    pub fn execute(&self) -> anyhow::Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => Secrets::default_secrets_path()
                .context("Could not determine the config directory")?,
        };

        Secrets::create_template(&path)?;

        println!("Created secrets template at {}", path.display());
        println!("Fill in app_id, the private key and webhook_secret before running `revu serve`.");

        Ok(())
    }
}

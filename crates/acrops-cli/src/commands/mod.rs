//! CLI commands and argument parsing.

pub mod catalog;
pub mod crd;
pub mod registry;
pub mod run;

use clap::{Parser, Subcommand};

/// acrops - Kubernetes controller for Azure Container Registry deployments
#[derive(Parser)]
#[command(name = "acrops")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the AcrDeployment controller
    Run(run::RunArgs),

    /// Print the AcrDeployment CustomResourceDefinition
    Crd(crd::CrdArgs),

    /// List the repositories of a registry once
    Catalog(catalog::CatalogArgs),

    /// Print version information
    Version,
}

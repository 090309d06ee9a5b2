//! Catalog command implementation.
//!
//! Runs a single enumeration outside the cluster, with the same endpoint
//! derivation, authentication and paging the controller uses.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use acrops_core::{AcrDeploymentSpec, RegistryEndpoint};
use acrops_registry::{CredentialScope, HttpRegistryClient};

use super::registry::{AuthArgs, RegistryArgs};

/// Arguments for the catalog command.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Registry identifier (e.g. `myregistry` for `myregistry.azurecr.io`)
    #[arg(short, long)]
    pub registry: String,

    /// Print the repositories as a JSON array
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub connection: RegistryArgs,

    #[command(flatten)]
    pub auth: AuthArgs,
}

/// Executes the catalog command.
///
/// # Errors
///
/// Returns an error if the identifier is invalid, authentication fails, or
/// any page cannot be fetched.
pub async fn execute(args: CatalogArgs) -> Result<()> {
    let endpoint = RegistryEndpoint::from_spec(
        &AcrDeploymentSpec::new(&args.registry),
        &args.connection.registry_domain,
    )
    .context("Invalid registry identifier")?;

    let client =
        HttpRegistryClient::new(args.connection.config()).context("Failed to create registry client")?;
    let credentials = args.auth.auth()?.into_provider(client.http().clone());

    info!(endpoint = %endpoint, "Listing repositories");

    let credential = credentials
        .acquire(&CredentialScope::catalog(&endpoint))
        .await
        .context("Failed to acquire registry credential")?;
    let repositories = client
        .list_repositories(&endpoint, &credential)
        .await
        .with_context(|| format!("Failed to list repositories of {endpoint}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&repositories)?);
    } else {
        for repository in &repositories {
            println!("{repository}");
        }
        eprintln!("{} repositories in {endpoint}", repositories.len());
    }
    Ok(())
}

//! CRD command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use kube::CustomResourceExt;

use acrops_core::AcrDeployment;

/// Arguments for the crd command.
#[derive(Args, Debug)]
pub struct CrdArgs {
    /// Write the manifest to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Renders the `AcrDeployment` CRD as YAML.
///
/// # Errors
///
/// Returns an error if the CRD cannot be serialized.
pub fn render() -> Result<String> {
    serde_yaml::to_string(&AcrDeployment::crd()).context("Failed to serialize CRD")
}

/// Runs the crd command.
///
/// # Errors
///
/// Returns an error if the CRD cannot be serialized or written.
pub fn run(args: &CrdArgs) -> Result<()> {
    let manifest = render()?;
    match &args.output {
        Some(path) => std::fs::write(path, manifest)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{manifest}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_crd() {
        let manifest = render().unwrap();
        assert!(manifest.contains("name: acrdeployments.deployments.acrops.io"));
        assert!(manifest.contains("- acrd"));
        assert!(manifest.contains("registryIdentifier"));
    }

    #[test]
    fn test_write_crd_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crd.yaml");
        run(&CrdArgs {
            output: Some(path.clone()),
        })
        .unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("kind: CustomResourceDefinition"));
    }
}

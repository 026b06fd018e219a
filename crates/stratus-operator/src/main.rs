//! Stratus Operator - declarative EKS cluster lifecycle management

mod controller_runner;
mod startup;

use clap::Parser;
use kube::{Client, CustomResourceExt};

use stratus_common::crd::EksCluster;
use stratus_common::telemetry;

/// Stratus - CRD-driven operator for managed EKS clusters
#[derive(Parser, Debug)]
#[command(name = "stratus", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The TLS provider must be installed before any client is built
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: failed to install crypto provider: {e:?}");
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&EksCluster::crd())
            .map_err(|e| anyhow::anyhow!("failed to serialize CRD: {e}"))?;
        println!("{crd}");
        return Ok(());
    }

    telemetry::init_telemetry("stratus-operator")
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;

    let client = Client::try_default().await?;
    startup::ensure_crds_installed(&client).await?;
    controller_runner::run(client).await;

    Ok(())
}

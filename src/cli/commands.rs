use crate::cli::{Commands, OutputFormat};
use crate::provider::{Connect, FixtureControlPlane};
use crate::{ClusterInspector, ClusterSnapshot, DescribeConfig};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Describe {
            name,
            region,
            fixture,
            exact,
            format,
        } => handle_describe(&name, region.as_deref(), fixture.as_deref(), exact, format).await,
        Commands::Starters {
            name,
            region,
            fixture,
        } => handle_starters(&name, region.as_deref(), fixture.as_deref()).await,
    }
}

async fn snapshot(
    name: &str,
    region: Option<&str>,
    fixture: Option<&Path>,
    exact: bool,
) -> Result<ClusterSnapshot> {
    let config = DescribeConfig::load().context("reading ECS_INFO_* configuration")?;

    let snapshot = match fixture {
        Some(path) => {
            let plane = FixtureControlPlane::from_path(path)
                .with_context(|| format!("loading cluster document {}", path.display()))?;
            info!("Serving requests from {}", path.display());
            run(ClusterInspector::new(plane, config)?, name, region, exact).await
        }
        None => live(config, name, region, exact).await,
    };

    snapshot.with_context(|| format!("describing cluster {}", name))
}

async fn run<C: Connect>(
    inspector: ClusterInspector<C>,
    name: &str,
    region: Option<&str>,
    exact: bool,
) -> Result<ClusterSnapshot> {
    let snapshot = if exact {
        inspector.describe(name, region).await?
    } else {
        inspector.resolve_by_name(name, region).await?
    };
    Ok(snapshot)
}

#[cfg(feature = "aws")]
async fn live(
    config: DescribeConfig,
    name: &str,
    region: Option<&str>,
    exact: bool,
) -> Result<ClusterSnapshot> {
    use crate::provider::AwsConnector;

    run(ClusterInspector::new(AwsConnector, config)?, name, region, exact).await
}

#[cfg(not(feature = "aws"))]
async fn live(
    _config: DescribeConfig,
    _name: &str,
    _region: Option<&str>,
    _exact: bool,
) -> Result<ClusterSnapshot> {
    anyhow::bail!("--fixture is required; rebuild with the `aws` feature to query a live cluster")
}

async fn handle_describe(
    name: &str,
    region: Option<&str>,
    fixture: Option<&Path>,
    exact: bool,
    format: OutputFormat,
) -> Result<()> {
    let summary = snapshot(name, region, fixture, exact).await?.summary();

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&summary)?,
        OutputFormat::Yaml => serde_yaml::to_string(&summary)?,
    };
    println!("{}", rendered);
    Ok(())
}

async fn handle_starters(name: &str, region: Option<&str>, fixture: Option<&Path>) -> Result<()> {
    let snapshot = snapshot(name, region, fixture, false).await?;

    for (label, token) in snapshot.workload_starters() {
        println!("{:<40} {}", label, token);
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tenantry::EngineManifest;
use tenantry_http::{serve, ServerConfig};

#[derive(Parser)]
#[command(name = "tenantry", about = "Per-tenant engine provisioning server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, env = "TENANTRY_BIND_ADDR", default_value = "127.0.0.1:7800")]
    bind_addr: String,
    /// Engine plugin name, used in routes and registry ids.
    #[arg(long, env = "TENANTRY_PLUGIN_NAME", default_value = "collections")]
    plugin_name: String,
    /// JSON manifest of the collections provisioned on each tenant.
    #[arg(long, env = "TENANTRY_ENGINE_MANIFEST")]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an engine manifest and print its collections as JSON
    CheckManifest {
        path: PathBuf,
    },
}

fn run_check_manifest(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = EngineManifest::load(path)?;
    println!("{}", serde_json::to_string(&manifest.collection_names())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckManifest { path }) => run_check_manifest(&path),
        None => {
            serve(ServerConfig {
                bind_addr: cli.bind_addr,
                plugin_name: cli.plugin_name,
                manifest: cli.manifest,
            })
            .await
        }
    }
}

use clap::Parser;
use std::path::PathBuf;
use vanta_mcp::config::Config;
use vanta_mcp::operations::OperationCatalog;
use vanta_mcp::utils::flags::parse_tool_filter;

#[derive(Debug, Parser)]
#[command(name = "vanta-mcp", version, about = "Vanta API tools over the Model Context Protocol (stdio)")]
struct Cli {
    /// Credential file (JSON or dotenv). Overrides VANTA_ENV_FILE.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Print the enabled tool names and exit without authenticating.
    #[arg(long)]
    list_tools: bool,
}

fn list_tools() -> Result<(), String> {
    let catalog = OperationCatalog::builtin().map_err(|err| err.to_string())?;
    let enabled = parse_tool_filter(std::env::var("VANTA_MCP_ENABLED_TOOLS").ok().as_deref());
    for operation in catalog.iter() {
        if enabled.is_empty() || enabled.contains(&operation.tool_name) {
            let marker = if operation.is_mutation { " [WRITE]" } else { "" };
            println!("{}{}", operation.tool_name, marker);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.list_tools {
        if let Err(err) = list_tools() {
            eprintln!("vanta-mcp: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let env_file = cli.env_file.map(|path| path.to_string_lossy().to_string());
    let config = Config::from_lookup(|key| {
        if key == "VANTA_ENV_FILE" {
            if let Some(path) = &env_file {
                return Some(path.clone());
            }
        }
        std::env::var(key).ok()
    });
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("vanta-mcp: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = vanta_mcp::mcp::server::run_stdio(config).await {
        eprintln!("vanta-mcp: {}", err);
        std::process::exit(1);
    }
}

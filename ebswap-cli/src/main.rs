mod output;
mod swap;

use clap::Parser;
use ebswap_core::{Console, LogLevel, init_logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ebswap")]
#[command(about = "Replace attached EBS volumes with copies restored from fresh snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Region hosting the instance
    region: String,

    /// Instance whose volumes are replaced
    instance_id: String,

    /// Volume ids separated by '|'; empty or "all" selects every non-root volume
    #[arg(default_value = "")]
    volume_ids: String,

    #[arg(long, help = "Path to configuration file (default: ~/.ebswap/config.yaml)")]
    config: Option<PathBuf>,

    #[arg(long, help = "List eligible volumes without changing anything")]
    dry_run: bool,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,

    #[arg(short, long, help = "Quiet output")]
    quiet: bool,

    #[arg(long, help = "Output format", value_enum, default_value = "table")]
    format: output::OutputFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let console = Console::stdout();
    init_logging(&console, LogLevel::from_flags(cli.verbose, cli.quiet));

    let args = swap::SwapArgs {
        region: cli.region,
        instance_id: cli.instance_id,
        volume_ids: cli.volume_ids,
        config: cli.config,
        dry_run: cli.dry_run,
    };

    let code = match swap::execute(args, cli.format, &console).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&console, &format!("Error: {e:#}"));
            1
        }
    };
    std::process::exit(code);
}

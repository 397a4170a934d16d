use clap::{CommandFactory, Parser};
use std::env;
use tracing_subscriber::EnvFilter;
use xprobe::cli::args::{Cli, OutputFormat};
use xprobe::core::config::ScanConfig;
use xprobe::core::engine::Engine;
use xprobe::reporting::{json, text};

const BANNER: &str = r#"
 ╔════════════════════════════════════════════════════════════════════╗
 ║                                                                    ║
 ║    ██╗  ██╗██████╗ ██████╗  ██████╗ ██████╗ ███████╗               ║
 ║    ╚██╗██╔╝██╔══██╗██╔══██╗██╔═══██╗██╔══██╗██╔════╝               ║
 ║     ╚███╔╝ ██████╔╝██████╔╝██║   ██║██████╔╝█████╗                 ║
 ║     ██╔██╗ ██╔═══╝ ██╔══██╗██║   ██║██╔══██╗██╔══╝                 ║
 ║    ██╔╝ ██╗██║     ██║  ██║╚██████╔╝██████╔╝███████╗               ║
 ║    ╚═╝  ╚═╝╚═╝     ╚═╝  ╚═╝ ╚═════╝ ╚═════╝ ╚══════╝               ║
 ║                                                                    ║
 ║    Context-aware XSS reflection and exploitability probe           ║
 ║                                                                    ║
 ╚════════════════════════════════════════════════════════════════════╝
"#;

fn print_banner() {
    eprintln!("\x1b[36m{}\x1b[0m", BANNER);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let no_banner = args.iter().any(|a| a == "--no-banner");

    // Banner above the help text unless suppressed
    if show_help {
        if !no_banner {
            print_banner();
        }
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let cli = Cli::parse();

    if !cli.no_banner && !cli.quiet {
        print_banner();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = ScanConfig::from_cli(&cli)?;
    let engine = Engine::new(config);

    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight probes...");
            cancel.cancel();
        }
    });

    let report = engine.run().await?;

    match cli.format {
        OutputFormat::Json => println!("{}", json::render(&report)?),
        OutputFormat::Text => print!("{}", text::render(&report)),
    }

    Ok(())
}

//! algoswitch - command line front end
//!
//! Turns a command line into a control command and prints its JSON encoding
//! for the event bus that delivers commands to pipeline nodes.

use algoswitch::{command::parse_command, config, SwitchConfig};
use anyhow::Context;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, StructOpt)]
#[structopt(name = "algoswitch", about = "Build algorithm switch and pipeline control commands.")]
struct Opt {
    /// Configuration file, TOML or JSON. Defaults to the platform config directory
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[structopt(long)]
    print_config: bool,

    /// Pretty-print the command JSON
    #[structopt(short, long)]
    pretty: bool,

    /// Command words, e.g. `changeAlgo pip switch fast inputPort 4000`.
    /// Separate several commands with `;`
    command: Vec<String>,
}

fn load_config(path: Option<&PathBuf>) -> SwitchConfig {
    match path.cloned().or_else(config::default_config_path) {
        Some(path) if path.exists() => SwitchConfig::load_or_default(&path),
        _ => SwitchConfig::default(),
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let config = load_config(opt.config.as_ref());

    // Keep the guard alive so buffered file logs are flushed on exit
    let (file_layer, _guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "algoswitch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,algoswitch=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if opt.print_config {
        print!("{}", config.to_toml().context("Failed to render configuration")?);
        return Ok(());
    }

    if opt.command.is_empty() {
        anyhow::bail!("no command given, see --help");
    }

    let words: Vec<&str> = opt.command.iter().map(String::as_str).collect();
    let command = parse_command(&words)
        .context("Failed to parse command")?
        .simplify()
        .context("Command is empty")?;
    tracing::debug!("built {} command: {}", command.display_name(), command);

    let json = if opt.pretty {
        serde_json::to_string_pretty(&command)?
    } else {
        serde_json::to_string(&command)?
    };
    println!("{}", json);
    Ok(())
}

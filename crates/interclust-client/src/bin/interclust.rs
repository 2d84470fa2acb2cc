//! CLI entrypoint for the interactive clustering client.

#[path = "interclust/cli.rs"]
mod cli;
#[path = "interclust/shell.rs"]
mod shell;
#[path = "interclust/style.rs"]
mod style;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use cli::{Cli, Command};
use shell::ShellOptions;
use style::Tone;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", style::err(Tone::Fail, format!("Error: {err:#}")));
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        None => shell::run_shell(ShellOptions {
            config: None,
            host: None,
            port: None,
            offline: false,
            verbose: cli.verbose,
        }),
        Some(Command::Run {
            config,
            host,
            port,
            offline,
        }) => shell::run_shell(ShellOptions {
            config,
            host,
            port,
            offline,
            verbose: cli.verbose,
        }),
        Some(Command::CheckConfig { config }) => check_config(config),
        Some(Command::Completions { shell }) => print_completions(shell),
    }
}

fn check_config(path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let config = shell::load_config(path)?;
    print!("{}", config.to_toml()?);
    println!("{}", style::out(Tone::Ok, "Configuration OK"));
    Ok(())
}

fn print_completions(shell: Shell) -> anyhow::Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "interclust", &mut std::io::stdout());
    Ok(())
}

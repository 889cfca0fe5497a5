use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::renderer::RendererKind;

const HELP_EPILOG: &str = r#"Config resolution order:
  1) --config/-c PATH
  2) $POSTETTE_CONFIG
  3) XDG default: ~/.config/postette/client.yaml

Input lines are plain text, optionally led by a level ("error: disk full"),
or JSON objects such as {"message": "Saved", "level": "success", "pause": "ample"}.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "postette",
    version,
    about = "Show short notifications one at a time, with timing and history",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the renderer chosen in the config file
    #[arg(long, value_enum)]
    pub renderer: Option<RendererKind>,
    /// Optional subcommand. Without one, reads notifications from stdin.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Read notifications from stdin, one per line, and show them
    Run {
        /// Print the history once every notification has been shown
        #[arg(long, value_enum)]
        history: Option<HistoryFormat>,
        /// Accept repeats of the message currently showing or waiting
        #[arg(long)]
        reiterate: bool,
    },
    /// Validate the config file and print the effective settings
    CheckConfig,
}

impl Default for Command {
    fn default() -> Self {
        Command::Run {
            history: None,
            reiterate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["postette"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Command::default());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "postette",
            "--renderer",
            "desktop",
            "run",
            "--history",
            "json",
            "--reiterate",
        ])
        .unwrap();
        assert_eq!(cli.renderer, Some(RendererKind::Desktop));
        assert_eq!(
            cli.command,
            Some(Command::Run {
                history: Some(HistoryFormat::Json),
                reiterate: true
            })
        );
    }

    #[test]
    fn check_config_parses() {
        let cli = Cli::try_parse_from(["postette", "-c", "/tmp/p.yaml", "check-config"]).unwrap();
        assert_eq!(cli.command, Some(Command::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.yaml")));
    }
}

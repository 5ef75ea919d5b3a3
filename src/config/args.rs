//! Command-line arguments

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "clicktrail", version, about = "Click attribution and postback delivery engine")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Write a sample configuration file with all defaults
    GenerateConfig {
        /// Output path, defaults to config.example.toml
        path: Option<String>,
    },
}

impl Cli {
    /// 未指定子命令时默认启动服务
    pub fn command_or_default(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_defaults_to_serve() {
        let cli = Cli::try_parse_from(["clicktrail"]).unwrap();
        assert_eq!(cli.command_or_default(), &Command::Serve);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_config_flag_short_and_long() {
        let cli = Cli::try_parse_from(["clicktrail", "-c", "custom.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));

        let cli = Cli::try_parse_from(["clicktrail", "--config=other.toml", "serve"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("other.toml"));
        assert_eq!(cli.command_or_default(), &Command::Serve);
    }

    #[test]
    fn test_generate_config_with_path() {
        let cli = Cli::try_parse_from(["clicktrail", "generate-config", "out.toml"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::GenerateConfig {
                path: Some("out.toml".to_string())
            })
        );
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pile",
    about = "Drive pile-backed linked lists from the command line",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Application config (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fill a list, remove part of it, and verify its structure
    Exercise(ExerciseArgs),
    /// Apply list operations given as arguments, e.g. `add:x remove:x print`
    Script(ScriptArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ExerciseArgs {
    /// Number of values to append
    #[arg(short = 'n', long, default_value = "1000")]
    pub count: u64,
    /// Remove every k-th value after filling (0 keeps everything)
    #[arg(short = 'k', long, default_value = "3")]
    pub remove_every: u64,
    /// Compact the pile after removal
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args)]
pub struct ScriptArgs {
    /// Operations: add:V, push-front:V, remove:V, contains:V, clear, len, print, check
    #[arg(required = true)]
    pub ops: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exercise_defaults() {
        let cli = Cli::try_parse_from(["pile", "exercise"]).unwrap();
        match cli.command {
            Command::Exercise(args) => {
                assert_eq!(args.count, 1000);
                assert_eq!(args.remove_every, 3);
                assert!(!args.compact);
            }
            _ => panic!("expected exercise"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_script_with_globals() {
        let cli = Cli::try_parse_from([
            "pile", "script", "add:a", "print", "--format", "json", "-c", "app.toml",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("app.toml")));
        match cli.command {
            Command::Script(args) => assert_eq!(args.ops, vec!["add:a", "print"]),
            _ => panic!("expected script"),
        }
    }

    #[test]
    fn script_requires_ops() {
        assert!(Cli::try_parse_from(["pile", "script"]).is_err());
    }
}

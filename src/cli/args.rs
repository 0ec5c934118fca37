//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Polling CMS engine: edit question and user aggregates as one unit
#[derive(Parser, Debug)]
#[command(name = "pollcms")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    /// Config file layered over the global one
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bind, validate and save aggregate submissions
    Form {
        #[command(subcommand)]
        command: FormCommands,
    },

    /// Show the details of a stored aggregate
    Show {
        /// Aggregate name (question, user_create, user_update)
        aggregate: String,
        /// Root entity id
        id: String,
    },

    /// List aggregates and their composite fields
    Info,

    /// Manage theme colours
    Theme {
        #[command(subcommand)]
        command: ThemeCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum FormCommands {
    /// Print the initial values as JSON
    Init {
        /// Aggregate name
        aggregate: String,
        /// Root entity id (omit for a create)
        #[arg(long)]
        id: Option<String>,
    },

    /// Bind and validate a submission without saving
    Validate {
        /// Aggregate name
        aggregate: String,
        /// Submission JSON file
        #[arg(value_hint = ValueHint::FilePath)]
        submission: PathBuf,
        /// Root entity id (omit for a create)
        #[arg(long)]
        id: Option<String>,
    },

    /// Validate a submission, then persist it
    Save {
        /// Aggregate name
        aggregate: String,
        /// Submission JSON file
        #[arg(value_hint = ValueHint::FilePath)]
        submission: PathBuf,
        /// Root entity id (omit for a create)
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommands {
    /// Show the effective theme
    Show,

    /// Set one colour
    Set {
        /// Colour key, e.g. primary_color
        key: String,
        /// Colour value, e.g. #424242
        value: String,
    },

    /// Restore the default colours
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_repeated_debug_flag_when_parsing_then_counts() {
        let cli = Cli::parse_from(["pollcms", "-ddd", "info"]);
        assert_eq!(cli.debug, 3);
    }

    #[test]
    fn given_save_with_id_when_parsing_then_binds_arguments() {
        let cli = Cli::parse_from(["pollcms", "form", "save", "question", "sub.json", "--id", "abc"]);
        match cli.command {
            Some(Commands::Form {
                command: FormCommands::Save { aggregate, submission, id },
            }) => {
                assert_eq!(aggregate, "question");
                assert_eq!(submission, PathBuf::from("sub.json"));
                assert_eq!(id.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

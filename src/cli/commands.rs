//! Command dispatch: one handler per subcommand

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::{Listable, SubmitOutcome, Validatable};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, FormCommands, ThemeCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{CompositeKind, EntityId, ErrorReport, Submission, SubEntityLink, ThemeSettings};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::{InfraError, InfraResult};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage("no command given, see --help".into()));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => {
            let settings = Settings::load(cli.config.as_deref())?;
            execute_config(command, &settings)
        }
        Commands::Form { command } => execute_form(command, &container(cli)?),
        Commands::Show { aggregate, id } => execute_show(&container(cli)?, aggregate, id),
        Commands::Info => execute_info(&container(cli)?),
        Commands::Theme { command } => execute_theme(command, &container(cli)?),
    }
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    let settings = Settings::load(cli.config.as_deref())?;
    debug!("container: store={}", settings.store_path.display());
    Ok(ServiceContainer::new(settings)?)
}

fn parse_id(raw: &str) -> CliResult<EntityId> {
    raw.parse()
        .map_err(|e| CliError::InvalidArgs(format!("invalid id '{raw}': {e}")))
}

fn parse_optional_id(raw: Option<&str>) -> CliResult<Option<EntityId>> {
    raw.map(parse_id).transpose()
}

/// Read a submission JSON file.
pub fn read_submission(path: &Path) -> InfraResult<Submission> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| InfraError::io(format!("read submission {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| InfraError::Submission {
        context: path.display().to_string(),
        message: e.to_string(),
    })
}

fn report_invalid(report: &ErrorReport) -> CliError {
    output::info(&output::report_tree(report));
    CliError::Invalid {
        error_count: report.error_count(),
    }
}

#[instrument(skip(container))]
fn execute_form(command: &FormCommands, container: &ServiceContainer) -> CliResult<()> {
    match command {
        FormCommands::Init { aggregate, id } => {
            let id = parse_optional_id(id.as_deref())?;
            let form = container.form(aggregate, id.as_ref())?;
            let json = serde_json::to_string_pretty(form.initial()).map_err(|e| {
                ApplicationError::OperationFailed {
                    context: "render initial values".into(),
                    source: Box::new(e),
                }
            })?;
            output::info(&json);
            Ok(())
        }
        FormCommands::Validate {
            aggregate,
            submission,
            id,
        } => {
            let id = parse_optional_id(id.as_deref())?;
            let submission = read_submission(submission)?;
            let form = container.form(aggregate, id.as_ref())?;
            let bound = form.validate(&submission);
            if !bound.is_valid() {
                return Err(report_invalid(&bound.report));
            }
            output::success(&format!("{aggregate} submission is valid"));
            Ok(())
        }
        FormCommands::Save {
            aggregate,
            submission,
            id,
        } => {
            let id = parse_optional_id(id.as_deref())?;
            let submission = read_submission(submission)?;
            let form = container.form(aggregate, id.as_ref())?;
            match form.submit(&submission)? {
                SubmitOutcome::Invalid(bound) => Err(report_invalid(&bound.report)),
                SubmitOutcome::Saved(committed) => {
                    let root = committed
                        .root_id()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "?".into());
                    output::action("Saved", &format!("{aggregate} {root}"));
                    Ok(())
                }
            }
        }
    }
}

fn execute_show(container: &ServiceContainer, aggregate: &str, id: &str) -> CliResult<()> {
    let id = parse_id(id)?;
    let form = container.form(aggregate, Some(&id))?;
    let details = form.details();
    let width = details.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    output::header(&format!("{aggregate} {id}"));
    for (label, value) in &details {
        output::detail(&label, &value, width);
    }
    Ok(())
}

fn execute_info(container: &ServiceContainer) -> CliResult<()> {
    let mut tree = Tree::new("aggregates".to_string());
    for name in container.registry.names() {
        let definition = container.registry.get(name).map_err(ApplicationError::from)?;
        let mut node = Tree::new(format!("{name} ({})", definition.root_type()));
        for composite in &definition.composites {
            let kind = match &composite.kind {
                CompositeKind::SubEntity(SubEntityLink::SharesRoot) => "shares root".to_string(),
                CompositeKind::SubEntity(SubEntityLink::BackReference(field)) => format!("sub-entity via {field}"),
                CompositeKind::Collection(spec) => match spec.max_rows {
                    Some(max) => format!("collection via {}, {}..{max} rows", spec.back_reference, spec.min_rows),
                    None => format!("collection via {}, {}+ rows", spec.back_reference, spec.min_rows),
                },
            };
            node.leaves
                .push(Tree::new(format!("{}: {} [{kind}]", composite.name, composite.entity_type)));
        }
        tree.leaves.push(node);
    }
    output::info(&tree);
    Ok(())
}

fn print_theme(theme: &ThemeSettings) {
    let width = theme.entries().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in theme.entries() {
        output::detail(key, value, width);
    }
}

fn execute_theme(command: &ThemeCommands, container: &ServiceContainer) -> CliResult<()> {
    let service = container.theme();
    match command {
        ThemeCommands::Show => {
            output::header(&service.path().display());
            print_theme(&service.load()?);
        }
        ThemeCommands::Set { key, value } => {
            service.set(key, value)?;
            output::action("Set", &format!("{key} = {value}"));
        }
        ThemeCommands::Reset => {
            let theme = service.reset()?;
            output::success("theme reset to defaults");
            print_theme(&theme);
        }
    }
    Ok(())
}

fn execute_config(command: &ConfigCommands, settings: &Settings) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) if path.exists() => output::action("global", &path.display()),
                Some(path) => output::action("global", &format!("{} (not found)", path.display())),
                None => output::warning("no config directory on this platform"),
            }
            output::action("store", &settings.store_path.display());
            output::action("theme", &settings.theme_path.display());
        }
    }
    Ok(())
}

//! Command dispatch

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::{AlarmTreeService, ChangeKind};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, ModeArg, SourceArgs, StoreKind};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_dir, global_config_path, Settings};
use crate::domain::{AlarmTree, DiffMode, RowSource};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::xml::XmlExporter;
use crate::infrastructure::InfraError;
use crate::tree_traits::ToTermTree;

/// Run the parsed command line and return the process exit code.
pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    let Some(command) = &cli.command else {
        Cli::command()
            .print_help()
            .map_err(|e| InfraError::io("print help", e))?;
        return Ok(exitcode::OK);
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "alarmtree", &mut io::stdout());
        return Ok(exitcode::OK);
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Roots { source } => cmd_roots(&container, source),
        Commands::Tree { source, leaves } => cmd_tree(&container, source, *leaves),
        Commands::Diff {
            hierarchy_db,
            alarm_db,
            mode,
            detector,
        } => cmd_diff(
            &container,
            hierarchy_db.as_deref(),
            alarm_db.as_deref(),
            *mode,
            detector.as_deref(),
        ),
        Commands::Resolve { source, root, path } => cmd_resolve(&container, source, root, path),
        Commands::ExportXml { source, output } => cmd_export_xml(&container, source, output.as_deref()),
        Commands::Populate {
            hierarchy_db,
            alarm_db,
            detector,
        } => cmd_populate(
            &container,
            hierarchy_db.as_deref(),
            alarm_db.as_deref(),
            detector.as_deref(),
        ),
        Commands::Config { command } => cmd_config(&container, command),
        Commands::Completion { .. } => Ok(exitcode::OK),
    }
}

/// Load the trees selected by `source`.
fn load_trees(container: &ServiceContainer, source: &SourceArgs) -> CliResult<Vec<AlarmTree>> {
    let service = &container.tree_service;
    let db = source.db.as_deref();
    let (trees, name) = match source.store {
        StoreKind::Hierarchy => {
            let db = container.hierarchy_db(db)?;
            (service.load_hierarchy(&db)?, db.describe())
        }
        StoreKind::Alarm => {
            let db = container.alarm_db(db)?;
            (service.load_alarm_config(&db)?, db.describe())
        }
    };
    Ok(service.select(trees, source.detector.as_deref(), &name)?)
}

#[instrument(level = "debug", skip(container))]
fn cmd_roots(container: &ServiceContainer, source: &SourceArgs) -> CliResult<i32> {
    let trees = load_trees(container, source)?;
    for root in trees.iter().filter_map(AlarmTree::root_component) {
        output::info(&format!("{}\t{} channels", root.name(), root.leaf_count()));
    }
    Ok(exitcode::OK)
}

#[instrument(level = "debug", skip(container))]
fn cmd_tree(container: &ServiceContainer, source: &SourceArgs, leaves: bool) -> CliResult<i32> {
    let trees = load_trees(container, source)?;
    let separator = &container.settings.path_separator;
    for tree in &trees {
        if leaves {
            tree.leaf_paths(separator)
                .iter()
                .for_each(|path| output::info(path));
        } else {
            output::info(&tree.to_term_tree());
        }
    }
    Ok(exitcode::OK)
}

#[instrument(level = "debug", skip(container))]
fn cmd_diff(
    container: &ServiceContainer,
    hierarchy_db: Option<&Path>,
    alarm_db: Option<&Path>,
    mode: ModeArg,
    detector: Option<&str>,
) -> CliResult<i32> {
    let service: &AlarmTreeService = &container.tree_service;

    let reference_db = container.hierarchy_db(hierarchy_db)?;
    let reference = service.select(
        service.load_hierarchy(&reference_db)?,
        detector,
        &reference_db.describe(),
    )?;

    // A detector absent from the alarm database is reported as missing, not an error
    let candidate_db = container.alarm_db(alarm_db)?;
    let candidate: Vec<AlarmTree> = service
        .load_alarm_config(&candidate_db)?
        .into_iter()
        .filter(|tree| {
            detector.map_or(true, |name| {
                tree.root_component().is_some_and(|root| root.name() == name)
            })
        })
        .collect();

    let mode = match mode {
        ModeArg::Attributes => DiffMode::Attributes,
        ModeArg::Name => DiffMode::NameOnly,
    };
    let report = service.compare(&reference, &candidate, mode);

    output::header(&format!(
        "{} -> {}",
        reference_db.describe(),
        candidate_db.describe()
    ));
    if report.is_empty() {
        output::success("trees are equivalent");
        return Ok(exitcode::OK);
    }

    for entry in &report.entries {
        let line = format!("{} ({} channels)", entry.path, entry.leaves);
        match entry.kind {
            ChangeKind::New => output::diff_add(&line),
            ChangeKind::Missing => output::diff_remove(&line),
        }
    }
    output::detail(&format!(
        "{} new, {} missing",
        report.count(ChangeKind::New),
        report.count(ChangeKind::Missing)
    ));
    Ok(exitcode::NO_MATCH)
}

#[instrument(level = "debug", skip(container))]
fn cmd_resolve(container: &ServiceContainer, source: &SourceArgs, root: &str, path: &str) -> CliResult<i32> {
    let trees = load_trees(container, source)?;
    let separator = &container.settings.path_separator;

    let Some(root_component) = trees
        .iter()
        .filter_map(AlarmTree::root_component)
        .find(|c| c.name() == root)
    else {
        return Err(CliError::InvalidArgs(format!("no root component named {}", root)));
    };

    let Some(component) = root_component.resolve(path, separator) else {
        output::warning(&format!("nothing at {} below {}", path, root));
        return Ok(exitcode::NO_MATCH);
    };

    output::info(&component.full_path(separator));
    let attributes = component.attributes();
    if !component.is_leaf() {
        output::detail(&format!("children: {}", component.child_names().iter().join(", ")));
    }
    for item in &attributes.guidance {
        output::detail(&format!("guidance: {}: {}", item.title, item.detail));
    }
    for item in &attributes.displays {
        output::detail(&format!("display: {}: {}", item.title, item.detail));
    }
    for item in &attributes.commands {
        output::detail(&format!("command: {}: {}", item.title, item.detail));
    }
    for action in &attributes.automated_actions {
        output::detail(&format!(
            "automated action: {}: {} (after {}s)",
            action.title, action.detail, action.delay
        ));
    }
    if let Some(pv) = &attributes.pv {
        output::detail(&format!(
            "pv: {} (enabled={}, latching={}, delay={})",
            pv.description, pv.enabled, pv.latching, pv.delay
        ));
    }
    Ok(exitcode::OK)
}

#[instrument(level = "debug", skip(container))]
fn cmd_export_xml(container: &ServiceContainer, source: &SourceArgs, out: Option<&Path>) -> CliResult<i32> {
    let trees = load_trees(container, source)?;
    let config_name = &container.settings.config_name;

    match out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| InfraError::io(format!("create {}", path.display()), e))?;
            let mut writer = XmlExporter::new(BufWriter::new(file)).write_config(config_name, &trees)?;
            writer
                .flush()
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::success(&format!("wrote {} trees to {}", trees.len(), path.display()));
        }
        None => {
            let mut stdout = XmlExporter::new(io::stdout().lock()).write_config(config_name, &trees)?;
            writeln!(stdout).map_err(|e| InfraError::io("write stdout", e))?;
        }
    }
    Ok(exitcode::OK)
}

#[instrument(level = "debug", skip(container))]
fn cmd_populate(
    container: &ServiceContainer,
    hierarchy_db: Option<&Path>,
    alarm_db: Option<&Path>,
    detector: Option<&str>,
) -> CliResult<i32> {
    let service = &container.tree_service;
    let source = container.hierarchy_db(hierarchy_db)?;
    let trees = service.select(service.load_hierarchy(&source)?, detector, &source.describe())?;

    let mut db = container.alarm_db_for_writing(alarm_db)?;
    let mut writer = db.writer()?;
    let created = service.populate(&trees, &mut writer)?;
    writer.commit()?;
    debug!("committed {} entries", created);

    output::success(&format!(
        "created {} entries for {}",
        created,
        trees
            .iter()
            .filter_map(AlarmTree::root_component)
            .map(|root| root.name())
            .join(", ")
    ));
    Ok(exitcode::OK)
}

fn cmd_config(container: &ServiceContainer, command: &ConfigCommands) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
        }
        ConfigCommands::Path => match global_config_path() {
            Some(path) => output::info(&path.display()),
            None => output::warning("no home directory, global config disabled"),
        },
        ConfigCommands::Init { force } => {
            let (Some(dir), Some(path)) = (global_config_dir(), global_config_path()) else {
                return Err(ApplicationError::Config {
                    message: "cannot determine config directory".into(),
                }
                .into());
            };
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "{} exists, use --force to overwrite",
                    path.display()
                )));
            }
            std::fs::create_dir_all(&dir)
                .map_err(|e| InfraError::io(format!("create {}", dir.display()), e))?;
            std::fs::write(&path, Settings::default().to_toml()?)
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::success(&format!("wrote {}", path.display()));
        }
    }
    Ok(exitcode::OK)
}

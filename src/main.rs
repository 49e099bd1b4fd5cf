//! obra CLI: construction progress tracking.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use obra::assistant::ProgressUpdateRequest;
use obra::budget::{BudgetTemplate, IncidenceBalance};
use obra::changelog::ChangeLog;
use obra::config::ObraConfig;
use obra::export::{ProjectReport, format_brl, format_percent};
use obra::paths::ObraPaths;
use obra::project::{BulkScope, Project, ProjectData, ProjectId};
use obra::tracker::Tracker;
use obra::unit::{HousingUnit, HousingUnits};

#[derive(Parser)]
#[command(name = "obra", version, about = "Construction progress tracking")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/obra/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user instead of the configured owner.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and data directories.
    Init,

    /// Create, list, inspect and share projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Add, remove or rename housing units.
    Unit {
        #[command(subcommand)]
        action: UnitAction,
    },

    /// Record execution percentages.
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Apply a batch of assistant update requests from a JSON file.
    Assist {
        project: String,
        /// JSON array of {serviceName, unitNames, progress}.
        #[arg(long)]
        file: PathBuf,
    },

    /// Show the change log, newest day first.
    Log {
        project: String,
        /// Only entries whose service or unit name contains this text.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print or write the progress report.
    Report {
        project: String,
        /// Write JSON to this file instead of printing a summary.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Budget template checks.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Export or import a JSON backup of all accessible projects.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project on the default or a custom budget template.
    Create {
        name: String,
        /// Total cost of works.
        #[arg(long)]
        cost: f64,
        /// Number of housing units (named "Unit 1", "Unit 2", ...).
        #[arg(long, conflicts_with = "unit_name")]
        units: Option<usize>,
        /// Explicit unit names, in order. Repeatable.
        #[arg(long = "unit-name")]
        unit_name: Vec<String>,
        /// Budget template JSON file (array of categories).
        #[arg(long)]
        budget: Option<PathBuf>,
    },
    /// List accessible projects.
    List,
    /// Show a project's figures.
    Show { project: String },
    /// Delete a project you own.
    Delete { project: String },
    /// Share a project.
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },
}

#[derive(Subcommand)]
enum MemberAction {
    Add { project: String, user: String },
    Remove { project: String, user: String },
}

#[derive(Subcommand)]
enum UnitAction {
    Add { project: String, name: String },
    Remove { project: String, unit: String },
    Rename { project: String, unit: String, name: String },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Set one cell.
    Set {
        project: String,
        /// Budget item id, e.g. 4.1.
        item: String,
        /// Housing unit id, e.g. u3.
        unit: String,
        value: f64,
    },
    /// Set a row, a column or the whole matrix.
    Bulk {
        project: String,
        #[command(flatten)]
        scope: ScopeArgs,
        value: f64,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ScopeArgs {
    /// Every unit of one item.
    #[arg(long)]
    item: Option<String>,
    /// Every item of one unit.
    #[arg(long)]
    unit: Option<String>,
    /// Every cell.
    #[arg(long)]
    all: bool,
}

impl ScopeArgs {
    fn into_scope(self) -> BulkScope {
        match (self.item, self.unit) {
            (Some(item), _) => BulkScope::Item(item),
            (None, Some(unit)) => BulkScope::Unit(unit),
            (None, None) => BulkScope::All,
        }
    }
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Check that a template's incidences sum to 100%.
    Check {
        /// Project to check.
        #[arg(conflicts_with = "file")]
        project: Option<String>,
        /// Template JSON file to check instead.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    Export {
        /// Destination file (default: state dir, timestamped).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import { file: PathBuf },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let paths = ObraPaths::resolve()?;
    let config_file = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let mut config = ObraConfig::load_or_default(&config_file)?;
    if let Some(user) = cli.user.clone() {
        config.owner_id = user;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let tracker = Tracker::open(&config, &paths)?;

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs()?;
            if !config_file.exists() {
                config.save(&config_file)?;
            }
            println!("Initialized obra for \"{}\"", tracker.user_id());
            println!("  config: {}", config_file.display());
            println!("  store:  {}", config.store_dir(&paths).display());
        }

        Commands::Project { action } => match action {
            ProjectAction::Create {
                name,
                cost,
                units,
                unit_name,
                budget,
            } => {
                let units = if unit_name.is_empty() {
                    HousingUnits::numbered(units.unwrap_or(config.default_unit_count))
                } else {
                    let list = unit_name
                        .into_iter()
                        .enumerate()
                        .map(|(i, name)| HousingUnit::new(format!("u{}", i + 1), name))
                        .collect();
                    HousingUnits::new(list)?
                };
                let mut data = ProjectData::new(name, cost, 0).with_units(units);
                if let Some(path) = budget {
                    data = data.with_budget(read_template(&path)?);
                }
                let project = tracker.create_project(data)?;
                println!("Created project {} \"{}\"", project.id, project.name);
                warn_balance(project.budget());
            }

            ProjectAction::List => {
                let projects = tracker.list_projects()?;
                if projects.is_empty() {
                    println!("No projects.");
                } else {
                    println!("Projects ({}):", projects.len());
                    for project in &projects {
                        let snapshot = project.snapshot();
                        println!(
                            "  {}  {:<32} {:>8}  {:>3} unit(s)  {}",
                            project.id,
                            project.name,
                            format_percent(snapshot.total_progress),
                            project.units().len(),
                            format_brl(project.cost_of_works),
                        );
                    }
                }
            }

            ProjectAction::Show { project } => {
                let project = tracker.open_project(&ProjectId::new(project))?;
                print_project(&project);
            }

            ProjectAction::Delete { project } => {
                let id = ProjectId::new(project);
                tracker.delete_project(&id)?;
                println!("Deleted project {id}");
            }

            ProjectAction::Member { action } => match action {
                MemberAction::Add { project, user } => {
                    tracker.add_member(&ProjectId::new(project), &user)?;
                    println!("Added member \"{user}\"");
                }
                MemberAction::Remove { project, user } => {
                    tracker.remove_member(&ProjectId::new(project), &user)?;
                    println!("Removed member \"{user}\"");
                }
            },
        },

        Commands::Unit { action } => match action {
            UnitAction::Add { project, name } => {
                let unit = tracker.with_project(&ProjectId::new(project), |p| p.add_unit(name))?;
                println!("Added unit {} \"{}\"", unit.id, unit.name);
            }
            UnitAction::Remove { project, unit } => {
                let removed =
                    tracker.with_project(&ProjectId::new(project), |p| p.remove_unit(&unit))?;
                println!("Removed unit {} \"{}\"", removed.id, removed.name);
            }
            UnitAction::Rename {
                project,
                unit,
                name,
            } => {
                tracker.with_project(&ProjectId::new(project), |p| p.rename_unit(&unit, name))?;
                println!("Renamed unit {unit}");
            }
        },

        Commands::Progress { action } => match action {
            ProgressAction::Set {
                project,
                item,
                unit,
                value,
            } => {
                let changed = tracker.with_project(&ProjectId::new(project), |p| {
                    p.set_progress(&item, &unit, value)
                })?;
                if changed {
                    println!("{item} on {unit} set to {}", format_percent(value));
                } else {
                    println!("{item} on {unit} already at {}", format_percent(value));
                }
            }
            ProgressAction::Bulk {
                project,
                scope,
                value,
            } => {
                let scope = scope.into_scope();
                let changed = tracker.with_project(&ProjectId::new(project), |p| {
                    p.bulk_set_progress(scope, value)
                })?;
                println!("{changed} cell(s) changed");
            }
        },

        Commands::Assist { project, file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let requests: Vec<ProgressUpdateRequest> =
                serde_json::from_str(&content).into_diagnostic()?;
            let report = tracker.assist(&ProjectId::new(project), &requests)?;
            println!("{}", report.summary);
            for applied in &report.applied {
                println!(
                    "  {} / {}: {} -> {}",
                    applied.item_name,
                    applied.unit_name,
                    format_percent(applied.old_progress),
                    format_percent(applied.new_progress),
                );
            }
        }

        Commands::Log { project, filter } => {
            let project = tracker.open_project(&ProjectId::new(project))?;
            let entries = project.change_log().filter(filter.as_deref().unwrap_or(""));
            if entries.is_empty() {
                println!("No changes recorded.");
            }
            for (date, day) in ChangeLog::by_date(&entries) {
                println!("{date}");
                for entry in day {
                    println!(
                        "  {}  {} / {}: {} -> {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.item_name,
                        entry.unit_name,
                        format_percent(entry.old_progress),
                        format_percent(entry.new_progress),
                    );
                }
            }
        }

        Commands::Report { project, out } => {
            let report = tracker.report(&ProjectId::new(project))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, report.to_json().into_diagnostic()?)
                        .into_diagnostic()?;
                    println!("Report written to {}", path.display());
                }
                None => print_report(&report),
            }
        }

        Commands::Template { action } => match action {
            TemplateAction::Check { project, file } => {
                let template = match (project, file) {
                    (_, Some(path)) => read_template(&path)?,
                    (Some(project), None) => tracker
                        .open_project(&ProjectId::new(project))?
                        .budget()
                        .clone(),
                    (None, None) => BudgetTemplate::default_housing(),
                };
                template.validate()?;
                println!(
                    "{} categories, {} items, total incidence {} ({})",
                    template.categories.len(),
                    template.item_count(),
                    format_percent(template.total_incidence()),
                    template.balance(),
                );
                if template.balance() == IncidenceBalance::Invalid {
                    miette::bail!("template incidences do not sum to 100%");
                }
            }
        },

        Commands::Backup { action } => match action {
            BackupAction::Export { out } => {
                let text = tracker.export_backup()?;
                let path = match out {
                    Some(path) => path,
                    None => {
                        paths.ensure_dirs()?;
                        paths.backups_dir().join(format!(
                            "obra-{}.json",
                            chrono::Utc::now().format("%Y%m%d-%H%M%S")
                        ))
                    }
                };
                std::fs::write(&path, text).into_diagnostic()?;
                println!("Backup written to {}", path.display());
            }
            BackupAction::Import { file } => {
                let text = std::fs::read_to_string(&file).into_diagnostic()?;
                let count = tracker.import_backup(&text)?;
                println!("Imported {count} project(s)");
            }
        },
    }

    Ok(())
}

fn read_template(path: &Path) -> Result<BudgetTemplate> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}

fn warn_balance(template: &BudgetTemplate) {
    if template.balance() != IncidenceBalance::Balanced {
        eprintln!(
            "warning: template incidences sum to {} ({})",
            format_percent(template.total_incidence()),
            template.balance()
        );
    }
}

fn print_project(project: &Project) {
    println!("{} \"{}\"", project.id, project.name);
    println!("  owner:   {}", project.owner_id);
    if !project.members.is_empty() {
        println!("  members: {}", project.members.join(", "));
    }
    println!("  created: {}", project.created_at.format("%Y-%m-%d"));
    if let Some(address) = &project.details.address {
        println!(
            "  address: {}, {} - {}, {}/{} {}",
            address.street,
            address.number,
            address.district,
            address.city,
            address.state,
            address.postal_code
        );
    }
    println!("  units:");
    for unit in project.units() {
        println!("    {}  {}", unit.id, unit.name);
    }
    print_report(&ProjectReport::build(project, chrono::Utc::now()));
}

fn print_report(report: &ProjectReport) {
    let snapshot = &report.snapshot;
    println!(
        "Progress {}  released {} of {}  to measure {}",
        format_percent(snapshot.total_progress),
        format_brl(snapshot.total_released),
        format_brl(snapshot.total_cost),
        format_brl(snapshot.balance_to_measure),
    );
    if snapshot.balance != IncidenceBalance::Balanced {
        println!(
            "  template incidence {} ({})",
            format_percent(snapshot.total_incidence),
            snapshot.balance
        );
    }
    if let Some(stage) = report.current_stage {
        println!("  current stage: {stage}");
    }
    for category in &snapshot.categories {
        println!(
            "  {:<4} {:<36} {:>8} of {:>7}  {}",
            category.id,
            category.name,
            format_percent(category.progress),
            format_percent(category.incidence),
            format_brl(category.released),
        );
        for item in &category.items {
            println!(
                "    {:<6} {:<34} {:>8} avg",
                item.id,
                item.name,
                format_percent(item.average_progress),
            );
        }
    }
    for (name, unit) in report.units.iter().zip(&snapshot.units) {
        println!("  {:<20} {:>8}", name, format_percent(unit.progress));
    }
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use class_allocation::config::{
    AllocationConfig, ClassPlan, DEFAULT_CLASS_CAPACITY, DEFAULT_CLASS_COUNT,
};
use class_allocation::models::StudentRecord;
use class_allocation::engine::{self, RunSettings};
use class_allocation::export::{self, ExportOptions};
use class_allocation::placement::ClassCodeStyle;
use class_allocation::{logger, roster};

#[derive(Parser)]
#[command(name = "class-allocation")]
#[command(about = "Stratified class allocation for preparatory programme rosters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example roster with the expected columns
    Template {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "roster_template.csv")]
        out: PathBuf,
    },
    /// Show current and next levels found in a roster
    Levels {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a class configuration for every level in a roster
    InitConfig {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_CLASS_COUNT)]
        classes: usize,
        #[arg(long, default_value_t = DEFAULT_CLASS_CAPACITY)]
        capacity: u32,
        #[arg(long, default_value = "classes.json")]
        out: PathBuf,
    },
    /// Place students into classes and write the class lists
    Allocate {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Classes per level [default: 1]. Only allowed when the configuration lists no classes
        #[arg(long)]
        classes: Option<usize>,
        /// Seats per class [default: 20]. Only allowed when the configuration lists no classes
        #[arg(long)]
        capacity: Option<u32>,
        #[arg(long, default_value_t = 1)]
        module: u32,
        /// Academic term label, e.g. 2026-2027
        #[arg(long)]
        term: Option<String>,
        #[arg(long, value_enum, default_value_t = ClassCodeStyle::Short)]
        code: ClassCodeStyle,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "allocation")]
        out: PathBuf,
        /// Replace an existing output directory
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AllocationConfig> {
    match path {
        Some(path) => AllocationConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(AllocationConfig::default()),
    }
}

fn load_roster(path: &Path, config: &AllocationConfig) -> anyhow::Result<roster::Roster> {
    roster::read_roster(path, &config.columns)
        .with_context(|| format!("failed to read roster {}", path.display()))
}

fn usable_students(
    loaded: &roster::Roster,
    settings: &RunSettings,
    path: &Path,
) -> anyhow::Result<(Vec<StudentRecord>, usize)> {
    engine::prepare_nonempty(loaded.students.clone(), &settings.catalog)
        .with_context(|| format!("no usable levels in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Template { config, out } => {
            let config = load_config(config.as_deref())?;
            roster::write_template(&out, &config.columns)
                .with_context(|| format!("failed to write template {}", out.display()))?;
            println!("Roster template written to {}.", out.display());
        }
        Commands::Levels {
            roster: roster_path,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let settings = RunSettings::from_config(&config);
            let loaded = load_roster(&roster_path, &config)?;

            if let Some(duplicates) = roster::find_duplicates(&loaded.students) {
                println!("Warning: {duplicates}");
            }

            let (students, dropped) = usable_students(&loaded, &settings, &roster_path)?;
            if dropped > 0 {
                println!("Skipped {dropped} rows without a level.");
            }

            let grades = engine::grade_summary(&students, &settings.rule);
            println!(
                "Grades: {} pass, {} fail, {} placement, {} unrecognized (kept at their level).",
                grades.pass, grades.fail, grades.placement, grades.unrecognized
            );

            println!("Current levels:");
            for count in engine::detected_levels(&students, &settings.catalog) {
                println!("- {}: {} students", count.level, count.students);
            }

            let (_, completed) = engine::partition_by_target(&students, &settings);
            println!("Levels to configure:");
            for count in engine::target_levels(&students, &settings) {
                println!("- {}: {} students", count.level, count.students);
            }
            if !completed.is_empty() {
                println!("{} students complete the final level.", completed.len());
            }
        }
        Commands::InitConfig {
            roster: roster_path,
            config,
            classes,
            capacity,
            out,
        } => {
            let mut config = load_config(config.as_deref())?;
            let settings = RunSettings::from_config(&config);
            let loaded = load_roster(&roster_path, &config)?;
            let (students, _) = usable_students(&loaded, &settings, &roster_path)?;

            let levels: Vec<String> = engine::target_levels(&students, &settings)
                .into_iter()
                .map(|count| count.level)
                .collect();
            config.levels = ClassPlan::uniform(&levels, classes, capacity).into_levels();
            config
                .save(&out)
                .with_context(|| format!("failed to write configuration {}", out.display()))?;
            println!(
                "Configuration for {} levels written to {}.",
                levels.len(),
                out.display()
            );
        }
        Commands::Allocate {
            roster: roster_path,
            config,
            classes,
            capacity,
            module,
            term,
            code,
            seed,
            out,
            force,
        } => {
            let config = load_config(config.as_deref())?;
            let mut settings = RunSettings::from_config(&config);
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            let loaded = load_roster(&roster_path, &config)?;

            let (students, _) = usable_students(&loaded, &settings, &roster_path)?;
            let levels: Vec<String> = engine::target_levels(&students, &settings)
                .into_iter()
                .map(|count| count.level)
                .collect();
            let plan = config
                .plan_or_uniform(&levels, classes, capacity)
                .context("invalid class configuration")?;

            let outcome = engine::run(loaded.students.clone(), &plan, &settings)
                .context("allocation failed")?;

            let today = Utc::now().date_naive();
            let term = term.unwrap_or_else(|| export::academic_term_for(today));
            let options = ExportOptions {
                module_number: module,
                academic_term: &term,
                code_style: code,
                generated_on: today,
                force,
            };
            let summary =
                export::write_exports(&out, &loaded, &outcome, &settings.catalog, &options)
                    .with_context(|| format!("failed to write exports to {}", out.display()))?;

            for warning in &outcome.warnings {
                println!("Warning: {warning}");
            }
            for result in &outcome.levels {
                for bucket in &result.classes {
                    println!("- {} created with {} students.", bucket.name, bucket.headcount());
                }
            }
            println!(
                "Placed {} students in {} classes, {} completed the final level.",
                summary.placements, summary.class_files, summary.completed
            );
            println!("Class lists written to {}.", out.display());
        }
    }

    Ok(())
}

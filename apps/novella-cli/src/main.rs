mod player;

use anyhow::Context;
use clap::{Parser, Subcommand};
use novella_common::SlotId;
use novella_persist::{PersistConfig, SaveEngine, SaveSlotMeta};
use novella_script::{InterpreterConfig, Opcode, parse, parse_choices};
use novella_stage::{CharacterRoster, StageConfig};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "novella", about = "Play branching dialogue scripts and manage save slots")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding `saves/` and `screenshots/`
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory scripts are loaded from
    #[arg(long, global = true, default_value = "scripts")]
    scripts_dir: PathBuf,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON character roster
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a script from the start
    Play {
        /// Script name, relative to the scripts directory
        script: String,
        /// Show lines at once instead of typing them out
        #[arg(long)]
        instant: bool,
    },
    /// Load a slot and keep playing
    Resume {
        /// Slot number or `auto`
        slot: SlotId,
        #[arg(long)]
        instant: bool,
    },
    /// Parse a script file and report problems
    Check {
        file: PathBuf,
    },
    /// List save slots
    Slots,
    /// Delete a save slot
    Delete {
        /// Slot number or `auto`
        slot: SlotId,
    },
}

/// Settings file layout. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub persist: Option<PersistConfig>,
    pub interpreter: InterpreterConfig,
    pub stage: StageConfig,
}

impl AppConfig {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config: AppConfig = match &cli.config {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("opening config {}", path.display()))?;
                serde_json::from_reader(file)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        if let Some(dir) = &cli.data_dir {
            let base = config.persist.take().unwrap_or_default();
            let under = PersistConfig::under(dir);
            config.persist = Some(PersistConfig {
                save_dir: under.save_dir,
                screenshot_dir: under.screenshot_dir,
                ..base
            });
        }
        Ok(config)
    }

    fn persist(&self) -> PersistConfig {
        self.persist.clone().unwrap_or_default()
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli)?;

    match &cli.command {
        Commands::Play { script, instant } => {
            let mut session = open_session(&cli, &config, *instant)?;
            session.start(script);
            session.run()?;
        }
        Commands::Resume { slot, instant } => {
            let mut session = open_session(&cli, &config, *instant)?;
            session
                .resume(*slot)
                .with_context(|| format!("resuming slot {slot}"))?;
            session.run()?;
        }
        Commands::Check { file } => check_script(file)?,
        Commands::Slots => {
            let engine = SaveEngine::open(config.persist())?;
            print_slot(&engine.get_slot_meta(SlotId::Auto)?);
            for meta in engine.all_manual_slots() {
                print_slot(&meta);
            }
        }
        Commands::Delete { slot } => {
            let mut engine = SaveEngine::open(config.persist())?;
            if engine.delete_slot(*slot)? {
                println!("Deleted slot {slot}");
            } else {
                println!("Slot {slot} was already empty");
            }
        }
    }

    Ok(())
}

fn open_session(cli: &Cli, config: &AppConfig, instant: bool) -> anyhow::Result<player::Session> {
    let roster = match &cli.roster {
        Some(path) => CharacterRoster::load(path)
            .with_context(|| format!("loading roster {}", path.display()))?,
        None => CharacterRoster::new(),
    };
    let engine = SaveEngine::open(config.persist())?;
    player::Session::new(
        player::SessionOptions {
            scripts_dir: cli.scripts_dir.clone(),
            interpreter: config.interpreter.clone(),
            stage: config.stage.clone(),
            instant,
        },
        roster,
        engine,
    )
}

fn print_slot(meta: &SaveSlotMeta) {
    if meta.is_empty {
        println!("[{:>4}] (empty)", meta.slot.to_string());
    } else {
        println!(
            "[{:>4}] {}  {:<20} played {}{}",
            meta.slot.to_string(),
            meta.save_time,
            meta.chapter,
            meta.formatted_play_time(),
            meta.screenshot
                .as_deref()
                .map(|s| format!("  ({s})"))
                .unwrap_or_default()
        );
    }
}

/// Parse a script file and print opcode counts, duplicate ids and dangling targets.
fn check_script(file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let records = parse(&text);
    println!("{}: {} records", file.display(), records.len());

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for record in &records {
        *counts.entry(record.opcode.token()).or_default() += 1;
    }
    for (token, count) in &counts {
        println!("  {token:<15} {count}");
    }

    let mut seen = HashSet::new();
    let mut problems = 0usize;
    for record in &records {
        if !seen.insert(record.id) {
            println!("  duplicate id {} (jumps go to the first one)", record.id);
            problems += 1;
        }
    }

    let ids: HashSet<_> = records.iter().map(|r| r.id).collect();
    for record in &records {
        let targets: Vec<i64> = match record.opcode {
            Opcode::Jump => match record.payload.trim().parse() {
                Ok(id) => vec![id],
                Err(_) => {
                    println!("  record {}: JUMP target '{}' is not an id", record.id, record.payload);
                    problems += 1;
                    continue;
                }
            },
            Opcode::Choose => parse_choices(&record.payload)
                .into_iter()
                .map(|o| o.target)
                .collect(),
            _ => continue,
        };
        for target in targets.into_iter().filter(|t| !ids.contains(t)) {
            println!("  record {}: target {target} does not exist", record.id);
            problems += 1;
        }
    }

    if problems == 0 {
        println!("OK");
    } else {
        println!("{problems} problem(s)");
    }
    Ok(())
}

//! sfzmap CLI - The `sfzmap` command.
//!
//! Converts SFZ instruments into JSON instrument maps.
//!
//! # Commands
//!
//! - **convert**: compile one file, or every `.sfz` file below a directory
//! - **inspect**: show fragments and records of a file, for debugging includes
//! - **init-config**: write a commented default configuration file

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use sfzmap::parser::{self, Record};
use sfzmap::{FsLoader, InstrumentMap};
use std::fs;
use std::path::{Path, PathBuf};

/// sfzmap - SFZ instrument compiler
#[derive(Parser, Debug)]
#[command(name = "sfzmap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert SFZ instruments into per-note JSON instrument maps", long_about = None)]
struct Args {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert an SFZ file, or a directory of SFZ files, to JSON
    Convert {
        /// SFZ file, or directory with --dir
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Convert every .sfz file below PATH
        #[arg(short, long)]
        dir: bool,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Show how a file is split into fragments and records
    Inspect {
        /// Path to the SFZ file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Convert { path, dir, pretty } => {
            let mut config = Config::load(args.config.as_deref())?;
            config.output.pretty |= pretty;
            convert(&path, dir, &config)
        }
        Commands::Inspect { file } => {
            let config = Config::load(args.config.as_deref())?;
            inspect(&file, &config)
        }
        Commands::InitConfig { force } => init_config(args.config, force),
    }
}

fn convert(path: &Path, dir: bool, config: &Config) -> Result<()> {
    let files = if dir {
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {}", path.display());
        }
        let mut files = Vec::new();
        find_sfz_files(path, &mut files);
        files.sort();
        files
    } else {
        if !path.is_file() {
            anyhow::bail!("File not found: {}", path.display());
        }
        vec![path.to_path_buf()]
    };

    if files.is_empty() {
        anyhow::bail!("No .sfz files found in {}", path.display());
    }

    let mut failed = 0;
    for file in &files {
        match convert_file(file, config) {
            Ok(output) => log::info!("{} -> {}", file.display(), output.display()),
            Err(e) => {
                log::error!("{:#}", e);
                failed += 1;
            }
        }
    }

    let converted = files.len() - failed;
    println!("Converted {} file(s)", converted);
    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed to convert", failed, files.len());
    }
    Ok(())
}

/// Compile one file and write its instrument map next to it.
fn convert_file(file: &Path, config: &Config) -> Result<PathBuf> {
    let map = sfzmap::compile_file(file, &FsLoader, &config.preprocess_options())
        .with_context(|| format!("Failed to convert {}", file.display()))?;

    let json = to_json(&map, config.output.pretty)?;
    let output = output_path(file, config.output_extension());
    fs::write(&output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

fn to_json(map: &InstrumentMap, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(map)?
    } else {
        serde_json::to_string(map)?
    };
    Ok(json)
}

/// Replace a trailing `.sfz` (any case) with `extension`, or append it.
fn output_path(input: &Path, extension: &str) -> PathBuf {
    if is_sfz(input) {
        input.with_extension(extension)
    } else {
        let mut name = input.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }
}

fn is_sfz(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("sfz"))
}

fn find_sfz_files(dir: &Path, files: &mut Vec<PathBuf>) {
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    find_sfz_files(&path, files);
                } else if is_sfz(&path) {
                    files.push(path);
                }
            }
        }
        Err(e) => log::warn!("Skipping {}: {}", dir.display(), e),
    }
}

fn inspect(file: &Path, config: &Config) -> Result<()> {
    let preprocessed =
        parser::preprocess_file(file, &FsLoader, &config.preprocess_options())
            .with_context(|| format!("Failed to preprocess {}", file.display()))?;

    println!("Fragments:");
    for fragment in &preprocessed.fragments {
        println!(
            "  {}:{} ({} lines)",
            fragment.origin_path.display(),
            fragment.starting_line + 1,
            fragment.line_count()
        );
    }

    if !preprocessed.bindings.is_empty() {
        let mut bindings: Vec<_> = preprocessed.bindings.iter().collect();
        bindings.sort();
        println!("Macros:");
        for (name, value) in bindings {
            println!("  {} = {}", name, value);
        }
    }

    let tokens = parser::tokenize_fragments(&preprocessed.fragments)?;
    let records = parser::parse::parse(&tokens)?;

    println!("Records:");
    for record in &records {
        match record {
            Record::Header(header) => println!(
                "  {} ({} opcodes)",
                header.kind.map_or("(no header)", |kind| kind.tag()),
                header.attributes.len()
            ),
            Record::Include(include) => println!("  #include {}", include.full_path().display()),
        }
    }

    let map = sfzmap::build(&records);
    println!("Groups:");
    for (label, slots) in map.iter() {
        println!("  {}: {} notes", label, slots.occupied_notes().count());
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_path()?,
    };
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::write_default_config_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

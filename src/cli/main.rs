use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use metaprobe::plugin::PluginRegistry;
use metaprobe::{config, pipeline, report};

#[derive(Parser, Debug)]
#[command(
    name = "metaprobe",
    version,
    about = "Inspect image metadata schemas and read or set print resolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (default: metaprobe.json next to binary)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Initialize a default metaprobe.json and exit
    #[arg(long)]
    init: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-encode an image with a new resolution in pixels per inch
    SetResolution {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "DPI")]
        dpi: f64,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Print the resolution of image files or of every file in directories
    GetResolution {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the metadata schemas of the readers for each format name
    DumpSchema {
        #[arg(value_name = "FORMAT", required = true)]
        formats: Vec<String>,
    },

    /// List every registered reader and writer with its capabilities
    DumpPlugins,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        anyhow::bail!("No command specified. Use --help for usage.");
    };

    let config = config::Config::load(cli.config.as_deref())?;
    let registry = PluginRegistry::with_builtin_plugins();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::SetResolution { input, dpi, output } => {
            let written = pipeline::change_resolution(&registry, &input, dpi, &output, &config)
                .with_context(|| format!("Failed to change resolution of {}", input.display()))?;
            if written == 0 {
                println!("No compatible writer found for {}", output.display());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::GetResolution { paths, json } => {
            let inputs = pipeline::collect_inputs(&paths);
            let mut results = Vec::new();

            for set in &inputs {
                if let (Some(dir), false) = (&set.directory, json) {
                    report::write_directory_header(&mut out, dir)?;
                }
                for path in &set.files {
                    let result = pipeline::read_resolution(&registry, path);
                    if !json {
                        report::write_resolution_report(&mut out, &result, config.resolution.display_precision)?;
                    }
                    results.push(result);
                }
            }

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
            } else {
                writeln!(out, "\nDone")?;
            }

            // Summary
            let failed = results.iter().filter(|r| r.failed()).count();
            let unread = results.iter().filter(|r| r.reader.is_none() && !r.failed()).count();
            log::info!(
                "Done: {} read, {unread} without a reader, {failed} failed out of {} files",
                results.len() - failed - unread,
                results.len()
            );

            Ok(if failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::DumpSchema { formats } => {
            report::write_schema_report(&mut out, &registry, &formats, config.schema.base_depth)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::DumpPlugins => {
            report::write_plugin_report(&mut out, &registry)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

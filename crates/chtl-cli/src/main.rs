//! CHTL module tool
//!
//! Command-line front end to the module resolution engine: build and
//! inspect module indices, resolve imports, and show search paths.

mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use commands::list::ExportKindArg;
use commands::resolve::ResolveKind;
use commands::Workspace;
use logging::LogFormat;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "chtl-mod")]
#[command(about = "CHTL module resolution and indexing", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file (defaults to <workspace>/chtl.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Engine install path; its `module` folder holds the bundled modules
    #[arg(long, global = true)]
    install_path: Option<PathBuf>,

    /// File being compiled; its directory is searched for modules
    #[arg(long, global = true)]
    active_file: Option<PathBuf>,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or inspect module indices
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Resolve a single import
    Resolve {
        /// Import kind
        #[arg(value_enum)]
        kind: ResolveKind,
        /// Import path as written after `from`
        path: String,
        /// The import carries an `as` clause
        #[arg(long)]
        alias: bool,
        /// Directory of the importing file
        #[arg(long)]
        from: Option<PathBuf>,
        /// Origin type tag, e.g. @Style
        #[arg(long)]
        tag: Option<String>,
        /// Origin block name
        #[arg(long)]
        block: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the module search paths
    Paths,

    /// Look up a module by name in the indices
    Lookup {
        /// Module name
        name: String,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find modules exporting a symbol
    Exports {
        /// Exported symbol
        symbol: String,
    },

    /// List modules
    List {
        /// Walk every search root instead of reading the indices
        #[arg(long)]
        all: bool,

        /// List indexed export names of this kind instead
        #[arg(long, value_enum, value_name = "KIND", conflicts_with = "all")]
        exports: Option<ExportKindArg>,
    },

    /// Watch module folders and keep the project index fresh
    Watch,
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Build a module index
    Build {
        /// Module folder to index (defaults to the project index)
        dir: Option<PathBuf>,
        /// Mark every module as official
        #[arg(long)]
        official: bool,
        /// Output directory (defaults to the indexed folder)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show bundled and project index status
    Status,
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut out = output::StyledOutput::new(output::resolve_color_choice(cli.color.as_deref()));
    let workspace = Workspace {
        root: cli.workspace,
        config: cli.config,
        install_path: cli.install_path,
        active_file: cli.active_file,
    };

    match cli.command {
        Commands::Index { command } => match command {
            IndexCommands::Build { dir, official, out: out_dir } => match dir {
                Some(dir) => commands::index::build(&mut out, &dir, official, out_dir.as_deref())?,
                None => commands::index::rebuild_project(&mut out, &workspace)?,
            },
            IndexCommands::Status => commands::index::status(&mut out, &workspace)?,
        },

        Commands::Resolve {
            kind,
            path,
            alias,
            from,
            tag,
            block,
            json,
        } => {
            let options = commands::resolve::ResolveOptions {
                kind,
                path,
                alias,
                from,
                tag,
                block,
                json,
            };
            return commands::resolve::execute(&mut out, &workspace, options);
        }

        Commands::Paths => commands::paths::execute(&mut out, &workspace)?,

        Commands::Lookup { name, json } => {
            return commands::lookup::module(&mut out, &workspace, &name, json);
        }

        Commands::Exports { symbol } => {
            return commands::lookup::exports(&mut out, &workspace, &symbol);
        }

        Commands::List {
            exports: Some(kind),
            ..
        } => commands::list::exports(&mut out, &workspace, kind)?,

        Commands::List { all, exports: None } => {
            commands::list::execute(&mut out, &workspace, all)?
        }

        Commands::Watch => commands::watch::execute(&mut out, &workspace)?,
    }

    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            let mut out = output::StyledOutput::new(output::resolve_color_choice(None));
            out.stderr_error("error: ");
            eprintln!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

//! The `hlac` command line analyzer.
//!
//! Exit code 0 on success (diagnostics do not change it), 1 on usage or
//! configuration errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hlac_conf::{AssemblerOptions, Library, PgmConf, ProcGrps};
use hlac_drv::{analyze, read_input, AnalyzerConfig, FileLibProvider};
use hlac_util::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "hlac", about = "HLASM front-end analyzer", version)]
struct Cli {
    /// Source file to analyze.
    input: PathBuf,

    /// Processor group configuration (proc_grps.json).
    #[arg(long)]
    proc_grps: Option<PathBuf>,

    /// Program mapping configuration (pgm_conf.json).
    #[arg(long)]
    pgm_conf: Option<PathBuf>,

    /// Processor group to use, overriding the program mapping.
    #[arg(long)]
    pgroup: Option<String>,

    /// Additional macro/copy library directories.
    #[arg(long = "lib")]
    libs: Vec<PathBuf>,

    /// SYSPARM value.
    #[arg(long)]
    sysparm: Option<String>,

    /// MACHINE option value.
    #[arg(long, conflicts_with = "optable")]
    machine: Option<String>,

    /// OPTABLE option value.
    #[arg(long)]
    optable: Option<String>,

    /// Enable double-byte continuation handling.
    #[arg(long)]
    dbcs: bool,

    /// Cap on retained diagnostics.
    #[arg(long)]
    max_diagnostics: Option<usize>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let text = read_input(&cli.input)?;
    let file_name = cli.input.to_string_lossy().into_owned();

    let proc_grps = match &cli.proc_grps {
        Some(path) => Some(ProcGrps::parse(&read_input(path)?)?),
        None => None,
    };
    let pgm_conf = match &cli.pgm_conf {
        Some(path) => Some(PgmConf::parse(&read_input(path)?)?),
        None => None,
    };

    let mut asm_options = AssemblerOptions::default();
    let mut lib_dirs = Vec::new();
    let mut macro_extensions = Vec::new();
    let mut diagnostic_limit = None;

    if let Some(conf) = &pgm_conf {
        diagnostic_limit = conf.diagnostics_suppress_limit;
    }

    // Pick the processor group: explicit flag first, then the program
    // mapping.
    let group_name = cli.pgroup.clone().or_else(|| {
        pgm_conf
            .as_ref()
            .and_then(|c| c.find(&file_name))
            .map(|m| m.pgroup.clone())
    });
    if let Some(conf) = &pgm_conf {
        if let Some(mapping) = conf.find(&file_name) {
            if let Some(opts) = &mapping.asm_options {
                asm_options.merge(opts);
            }
        }
    }
    if let (Some(grps), Some(name)) = (&proc_grps, &group_name) {
        let group = grps
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("processor group '{name}' not found"))?;
        if let Some(opts) = &group.asm_options {
            asm_options.merge(opts);
        }
        macro_extensions.extend(grps.macro_extensions.iter().cloned());
        for lib in &group.libs {
            match lib {
                Library::Plain(path) => lib_dirs.push(PathBuf::from(path)),
                Library::Path {
                    path,
                    macro_extensions: exts,
                    ..
                } => {
                    lib_dirs.push(PathBuf::from(path));
                    macro_extensions.extend(exts.iter().cloned());
                }
                // Remote flavors need a host-side provider.
                Library::Dataset { .. } | Library::Endevor { .. } => {}
            }
        }
    }

    lib_dirs.extend(cli.libs.iter().cloned());
    if let Some(sysparm) = cli.sysparm {
        asm_options.sysparm = Some(sysparm);
    }
    if let Some(machine) = cli.machine {
        asm_options.machine = Some(machine);
    }
    if let Some(optable) = cli.optable {
        asm_options.optable = Some(optable);
    }
    if !asm_options.valid() {
        anyhow::bail!("invalid assembler options");
    }
    if let Some(limit) = cli.max_diagnostics {
        diagnostic_limit = Some(limit);
    }

    let provider = FileLibProvider::new(lib_dirs, macro_extensions);
    let config = AnalyzerConfig {
        file_name,
        asm_options,
        diagnostic_limit,
        dbcs: cli.dbcs,
        checker: None,
        preprocessor: None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let cancel = CancellationToken::new();
    let result = runtime
        .block_on(analyze(&text, config, &provider, &cancel))
        .map_err(|_| anyhow::anyhow!("analysis canceled"))?;

    for diagnostic in &result.diagnostics {
        println!("{diagnostic}");
    }
    if result.suppressed > 0 {
        eprintln!("note: {} diagnostics suppressed", result.suppressed);
    }
    tracing::debug!(metrics = ?result.metrics, "analysis finished");

    Ok(ExitCode::SUCCESS)
}

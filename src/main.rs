//! Command-line front end for the CVS migration analysis core.
//!
//! Walks a CVS repository for `,v` archives, drives each one through
//! [`cvs_analyzer_core::callback::analyze_file`], and once the whole
//! batch has been analyzed, drains the resulting
//! [`cvs_analyzer_core::GlobalCollector`] into the artifact files
//! described in the core's configuration (§6, "Artifact files").
//! Everything here is a thin collaborator: the core never touches the
//! filesystem or a database itself (§5, §6).

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use cvs_analyzer_core::{
    callback,
    config::{Config, SymbolTransform},
    GlobalCollector,
};
use cvs_analyzer_store::SqliteSink;
use structopt::StructOpt;
use walkdir::WalkDir;

#[derive(Debug, StructOpt)]
#[structopt(about = "Analyzes a CVS repository's RCS archives for migration to a modern VCS")]
struct Opt {
    #[structopt(help = "root of the CVS repository to walk for \",v\" archives")]
    repository: PathBuf,

    #[structopt(long, help = "TOML file with base configuration; CLI flags below override it")]
    config: Option<PathBuf>,

    #[structopt(
        short,
        long,
        help = "directory artifact files are written to",
        default_value = "."
    )]
    out_dir: PathBuf,

    #[structopt(
        long,
        parse(try_from_str = parse_symbol_transform),
        help = "an ordered symbol rename rule, as PATTERN=REPLACEMENT; may be given more than once; appended after any in --config"
    )]
    symbol_transform: Vec<SymbolTransform>,

    #[structopt(
        long,
        parse(try_from_str = parse_duration::parse::parse),
        help = "resync deltas at or above this threshold are logged as warnings"
    )]
    commit_threshold: Option<Duration>,

    #[structopt(long, help = "parse branches but never emit revisions on them")]
    trunk_only: bool,

    #[structopt(long, help = "author attributed to commits this tool manufactures itself")]
    username: Option<String>,
}

fn parse_symbol_transform(raw: &str) -> Result<SymbolTransform, String> {
    let (pattern, replacement) = raw
        .split_once('=')
        .ok_or_else(|| format!("{:?} is not of the form PATTERN=REPLACEMENT", raw))?;

    SymbolTransform::new(pattern, replacement).map_err(|e| e.to_string())
}

/// Loads the base configuration from `--config`, if given, then layers
/// the CLI flags on top (§6, "Configuration"). `trunk_only` is sticky
/// once either source sets it, since there's no sense in a flag
/// "un-setting" it back to false.
fn load_config(opt: &Opt) -> anyhow::Result<Config> {
    let mut config = match &opt.config {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    config.symbol_transforms.extend(opt.symbol_transform.iter().cloned());
    if let Some(threshold) = opt.commit_threshold {
        config.commit_threshold = threshold;
    }
    if let Some(username) = &opt.username {
        config.username = username.clone();
    }
    config.trunk_only |= opt.trunk_only;

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let opt = Opt::from_args();
    let config = load_config(&opt)?;

    fs::create_dir_all(&opt.out_dir)?;

    let mut collector = GlobalCollector::new(config);
    for path in find_archives(&opt.repository) {
        if let Err(e) = analyze_one(&mut collector, &opt.repository, &path) {
            log::warn!("{}: {}", path.display(), e);
        }
    }

    let mut sink = SqliteSink::new(
        opt.out_dir.join("store.db"),
        opt.out_dir.join("resync.log"),
        opt.out_dir.join("all-revisions.log"),
    )?;
    cvs_analyzer_store::write_collector(&mut sink, &collector)?;

    log::info!(
        "analyzed {} file(s), {} revision(s), {} fatal error(s)",
        collector.stats().files_processed,
        collector.stats().revisions_processed,
        collector.fatal_errors().len(),
    );

    for fatal in collector.fatal_errors() {
        log::error!("{}: {}", fatal.path.display(), fatal.message);
    }

    std::process::exit(if collector.fatal_errors().is_empty() { 0 } else { 1 });
}

/// Walks `root` for every file whose name ends in `,v` — the only
/// naming convention RCS archives use, Attic or not.
fn find_archives(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.to_string_lossy().ends_with(",v"))
        .collect()
}

/// Derives a file's repository-relative path from its filesystem path,
/// stripping the `,v` suffix (the Attic component itself is stripped
/// later, by [`cvs_analyzer_core::file::CVSFile::canonical_of`]).
fn repository_path(root: &Path, filesystem_path: &Path) -> PathBuf {
    let relative = filesystem_path.strip_prefix(root).unwrap_or(filesystem_path);
    let stripped = relative.to_string_lossy();
    PathBuf::from(stripped.strip_suffix(",v").unwrap_or(&stripped))
}

fn analyze_one(collector: &mut GlobalCollector, root: &Path, filesystem_path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(filesystem_path)?;
    let archive = comma_v::parse(&bytes)?;

    let metadata = fs::metadata(filesystem_path)?;
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    };

    let repo_path = repository_path(root, filesystem_path);
    callback::analyze_file(collector, filesystem_path, &repo_path, executable, metadata.len(), &archive)?;

    Ok(())
}

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use reviewowners::{parser, RuleSet};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod directory;
mod report;
mod review;

use directory::DirectoryCache;
use review::{TimelineEvent, Verdict};

#[derive(Parser)]
#[command(version, about = "Work out which CODEOWNERS must review a change")]
struct Cli {
    /// Log matching decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the owners of a change and, given a team directory, check
    /// whether every one of them has approved
    Check(CheckArgs),
    /// Show the owners of individual paths
    Explain(ExplainArgs),
    /// Show the owners of every file under a directory
    Tree(TreeArgs),
    /// Resolve many change sets and list those needing several owners
    Report(ReportArgs),
}

#[derive(Args)]
struct CodeownersSource {
    #[arg(short = 'f', long = "file")]
    codeowners_file: Option<PathBuf>,
}

impl CodeownersSource {
    fn codeowners_path(&self) -> PathBuf {
        self.codeowners_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("./CODEOWNERS"))
    }

    fn load(&self) -> Result<RuleSet> {
        let path = self.codeowners_path();
        let source = fs::read_to_string(&path)
            .with_context(|| format!("no CODEOWNERS file found at {}", path.display()))?;
        let result = parser::parse(&source);
        for error in &result.errors {
            let line = source[..error.span.0].matches('\n').count() + 1;
            warn!(line, "skipping CODEOWNERS line: {}", error.message);
        }
        Ok(result.into_ruleset())
    }
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    source: CodeownersSource,

    /// Changed file paths
    paths: Vec<String>,

    /// Read changed file paths from a file, one per line (`-` for stdin)
    #[arg(long)]
    files_from: Option<PathBuf>,

    /// Team listing JSON: {"teams": {"<slug>": ["login", ...]}}
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Team directory cache file, refreshed from --directory when given
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Login of a user who approved the change
    #[arg(long = "approver")]
    approvers: Vec<String>,

    /// Review timeline JSON; authors of APPROVED reviews count as approvers
    #[arg(long)]
    reviews: Option<PathBuf>,

    /// File to append `approved=<bool>` to
    #[arg(long, env = "GITHUB_OUTPUT")]
    output: Option<PathBuf>,

    /// Branch the change targets; the check passes unless it is the
    /// protected branch
    #[arg(long)]
    base_ref: Option<String>,

    #[arg(long, default_value = "develop")]
    protected_branch: String,

    /// Branch the change comes from; mergeback branches pass the check
    #[arg(long)]
    head_ref: Option<String>,

    #[arg(long, default_value = "merge-release")]
    skip_head_prefix: String,
}

impl CheckArgs {
    fn changed_files(&self) -> Result<Vec<String>> {
        let mut files = self.paths.clone();
        if let Some(path) = &self.files_from {
            let contents = read_input(path)?;
            files.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );
        }
        Ok(files)
    }

    fn approvers(&self) -> Result<Vec<String>> {
        let mut approvers = self.approvers.clone();
        if let Some(path) = &self.reviews {
            let contents = read_input(path)?;
            let timeline: Vec<TimelineEvent> = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse reviews from {}", path.display()))?;
            approvers.extend(review::approving_users(&timeline));
        }
        approvers.sort();
        approvers.dedup();
        Ok(approvers)
    }

    fn skip_reason(&self) -> Option<String> {
        review::skip_reason(
            self.base_ref.as_deref(),
            &self.protected_branch,
            self.head_ref.as_deref(),
            &self.skip_head_prefix,
        )
    }

    fn write_output(&self, verdict: &Verdict) -> Result<()> {
        if let Some(output) = &self.output {
            review::append_output(output, verdict)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Ok(())
    }
}

#[derive(Args)]
struct ExplainArgs {
    #[command(flatten)]
    source: CodeownersSource,

    paths: Vec<String>,

    /// List every matching rule rather than only the winning one
    #[arg(long)]
    all_matching_rules: bool,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    source: CodeownersSource,

    /// Directory to walk
    #[arg(default_value = ".")]
    root: PathBuf,
}

#[derive(Args)]
struct ReportArgs {
    #[command(flatten)]
    source: CodeownersSource,

    /// Change sets JSON: {"<number>": ["path", ...]}
    change_sets: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Command::Check(args) => check(&args),
        Command::Explain(args) => explain(&args).map(|()| ExitCode::SUCCESS),
        Command::Tree(args) => tree(&args).map(|()| ExitCode::SUCCESS),
        Command::Report(args) => run_report(&args).map(|()| ExitCode::SUCCESS),
    }
}

fn check(args: &CheckArgs) -> Result<ExitCode> {
    let today = chrono::Utc::now().date_naive();
    let verdict = run_check(args, today)?;
    Ok(exit_code(verdict.as_ref()))
}

// Without a team directory there is nothing to approve against, so only the
// required owners are printed and no verdict is returned.
fn run_check(args: &CheckArgs, today: NaiveDate) -> Result<Option<Verdict>> {
    if let Some(reason) = args.skip_reason() {
        let verdict = Verdict::Skipped { reason };
        info!("{}", verdict.reason());
        args.write_output(&verdict)?;
        return Ok(Some(verdict));
    }

    let ruleset = args.source.load()?;
    let changed_files = args.changed_files()?;
    let required = ruleset.resolve(&changed_files);
    info!(files = changed_files.len(), "required codeowners: {}", required);

    let cache = args.cache.as_deref().map(DirectoryCache::new);
    let Some(team_directory) =
        directory::select_directory(args.directory.as_deref(), cache.as_ref(), today)?
    else {
        for owner in required.iter() {
            println!("{}", owner);
        }
        return Ok(None);
    };

    let approvers = args.approvers()?;
    let outstanding = review::outstanding_owners(&required, &team_directory, &approvers);
    let verdict = Verdict::from_outstanding(outstanding);
    args.write_output(&verdict)?;

    println!("{}", verdict.reason());
    if verdict.is_approved() {
        info!("required approvals met: {}", verdict.reason());
    } else {
        warn!("required approvals not met: {}", verdict.reason());
    }
    Ok(Some(verdict))
}

fn exit_code(verdict: Option<&Verdict>) -> ExitCode {
    match verdict {
        Some(verdict) if !verdict.is_approved() => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

fn explain(args: &ExplainArgs) -> Result<()> {
    let ruleset = args.source.load()?;
    for path in &args.paths {
        if args.all_matching_rules {
            println!("{}", path);
            for (idx, rule) in ruleset.matching_rules(path) {
                let glob = ruleset
                    .pattern(idx)
                    .map(|p| p.to_glob())
                    .unwrap_or_default();
                println!(
                    "  rule {:<4} {:<40} {:<50} {}",
                    idx + 1,
                    rule.pattern,
                    glob,
                    owners_label(&rule.owners)
                );
            }
        } else {
            print_owners(&ruleset, path);
        }
    }
    Ok(())
}

fn tree(args: &TreeArgs) -> Result<()> {
    let ruleset = args.source.load()?;
    if !args.root.is_dir() {
        anyhow::bail!("not a directory: {}", args.root.display());
    }
    for entry in walk_files(&args.root) {
        let path = entry
            .path()
            .strip_prefix(&args.root)
            .unwrap_or_else(|_| entry.path())
            .to_string_lossy()
            .to_string();
        print_owners(&ruleset, &path);
    }
    Ok(())
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let ruleset = args.source.load()?;
    let contents = read_input(&args.change_sets)?;
    let change_sets: report::ChangeSets = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", args.change_sets.display()))?;
    info!(change_sets = change_sets.len(), "resolving change sets");

    let results = report::resolve_all(&ruleset, &change_sets);
    print!("{}", report::render(&results));
    Ok(())
}

fn print_owners(ruleset: &RuleSet, path: &str) {
    match ruleset.owners(path) {
        Some(owners) => println!("{:<70}  {}", path, owners_label(owners)),
        None => println!("{:<70}  (unowned)", path),
    }
}

fn owners_label(owners: &[reviewowners::Owner]) -> String {
    owners
        .iter()
        .map(|owner| owner.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut contents = String::new();
        io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read stdin")?;
        return Ok(contents);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn walk_files(root: impl AsRef<Path>) -> impl Iterator<Item = walkdir::DirEntry> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|entry| !entry.file_type().is_dir())
}

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gitfam_core::{ExpirationConfig, FamConfig, OutputFormat, ScoringMode, UserIdentity, WeightConfig};
use gitfam_gitpulse::{GitSignals, PathFilter};
use gitfam_scoring::hotspots::{self, HotspotMode};
use gitfam_scoring::strategy::{ScoringContext, ScoringOptions};
use gitfam_scoring::tree::{build_tree, FolderScore};

mod render;

#[derive(Parser)]
#[command(
    name = "gitfam",
    version,
    about = "How well do you know this codebase?",
    long_about = "gitfam scores how familiar you (or your team) are with every file and folder\n\
                   of a git repository, then points at the hotspots and single-owner files\n\
                   where that familiarity is missing.\n\n\
                   Examples:\n  \
                     gitfam score                        Your familiarity, committed mode\n  \
                     gitfam score --mode weighted        Blame and commit activity combined\n  \
                     gitfam hotspots --team              Busy files few people know\n  \
                     gitfam coverage                     Bus factor and single-owner files\n  \
                     gitfam compare -u ann -u bob        Side-by-side familiarity\n  \
                     gitfam reviewers --base main        Who should review this branch"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .gitfam.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Score your familiarity with every file and folder
    #[command(long_about = "Score your familiarity with every file and folder.\n\n\
        Modes:\n  \
          committed      1 for every file you ever committed to (default)\n  \
          code-coverage  Share of current lines blame attributes to you\n  \
          weighted       Blame blended with recency-decayed commit activity\n\n\
        Expiration drops files you have not touched recently or that changed a lot\n\
        since you last did: never, time:180d, change:50%, combined:365d:50%.\n\n\
        Examples:\n  gitfam score\n  gitfam score --mode weighted --weights 0.6,0.3,0.1\n  gitfam score --user bob@example.com --expiration time:180d")]
    Score {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Git user name or email (default: git config user)
        #[arg(long, short)]
        user: Option<String>,

        /// Scoring mode (overrides config)
        #[arg(long, short)]
        mode: Option<ScoringMode>,

        /// Weights for weighted mode: blame,commit,review
        #[arg(long, short)]
        weights: Option<WeightConfig>,

        /// Expiration policy (overrides config)
        #[arg(long, short)]
        expiration: Option<ExpirationConfig>,
    },
    /// Rank frequently changed files nobody knows well
    #[command(long_about = "Rank frequently changed files nobody knows well.\n\n\
        Risk is change frequency inside the window, normalized to the busiest file,\n\
        times one minus familiarity. Personal mode uses your scored tree; team mode\n\
        uses how many contributors have touched each file.\n\n\
        Examples:\n  gitfam hotspots\n  gitfam hotspots --team --window 30")]
    Hotspots {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Git user name or email for personal mode (default: git config user)
        #[arg(long, short)]
        user: Option<String>,

        /// Use team-wide contributor counts instead of one user's familiarity
        #[arg(long)]
        team: bool,

        /// Time window in days (overrides config)
        #[arg(long)]
        window: Option<u32>,

        /// Scoring mode for personal familiarity (overrides config)
        #[arg(long, short)]
        mode: Option<ScoringMode>,
    },
    /// Show bus factor and files only one person has touched
    #[command(long_about = "Show bus factor and files only one person has touched.\n\n\
        The bus factor is the smallest group of contributors who together touched\n\
        at least half of the files.\n\n\
        Examples:\n  gitfam coverage\n  gitfam coverage --format json")]
    Coverage {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Compare familiarity of several users side by side
    #[command(long_about = "Compare familiarity of several users side by side.\n\n\
        Pass --user more than once, or --team for every contributor with at least\n\
        three commits. Without either, the current git user is scored.\n\n\
        Examples:\n  gitfam compare -u ann@example.com -u bob@example.com\n  gitfam compare --team --mode code-coverage")]
    Compare {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Git user name or email (repeatable)
        #[arg(long, short)]
        user: Vec<String>,

        /// Compare every contributor
        #[arg(long)]
        team: bool,

        /// Scoring mode (overrides config)
        #[arg(long, short)]
        mode: Option<ScoringMode>,
    },
    /// Check how well the author knows a change set and suggest reviewers
    #[command(long_about = "Check how well the author knows a change set and suggest reviewers.\n\n\
        Changed files come from the positional arguments or from the diff between\n\
        --base and HEAD. Candidates are the most active contributors other than the\n\
        author.\n\n\
        Examples:\n  gitfam reviewers --base main\n  gitfam reviewers src/lib.rs src/main.rs --author ann@example.com")]
    Reviewers {
        /// Changed files, relative to the repository root
        files: Vec<String>,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Take changed files from the diff between this revision and HEAD
        #[arg(long)]
        base: Option<String>,

        /// Change author name or email (default: git config user)
        #[arg(long)]
        author: Option<String>,

        /// Number of reviewers to suggest (overrides config)
        #[arg(long)]
        count: Option<usize>,

        /// Familiarity percentage below which a file is unfamiliar (overrides config)
        #[arg(long)]
        threshold: Option<u32>,

        /// Scoring mode (overrides config)
        #[arg(long, short)]
        mode: Option<ScoringMode>,
    },
    /// Create a default .gitfam.toml configuration file
    #[command(long_about = "Create a default .gitfam.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .gitfam.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mgitfam\x1b[0m v{version} — how well do you know this codebase?\n");

        println!("Quick start:");
        println!("  \x1b[36mgitfam init\x1b[0m                   Create a .gitfam.toml config file");
        println!("  \x1b[36mgitfam score\x1b[0m                  Your familiarity with this repo");
        println!("  \x1b[36mgitfam hotspots --team\x1b[0m        Busy files few people know\n");

        println!("All commands:");
        println!("  \x1b[32mscore\x1b[0m      Per-folder familiarity for one user");
        println!("  \x1b[32mhotspots\x1b[0m   Change frequency against familiarity");
        println!("  \x1b[32mcoverage\x1b[0m   Bus factor and single-owner files");
        println!("  \x1b[32mcompare\x1b[0m    Several users side by side");
        println!("  \x1b[32mreviewers\x1b[0m  Change set familiarity and reviewer suggestions");
        println!("  \x1b[32minit\x1b[0m       Create default configuration\n");
    } else {
        println!("gitfam v{version} — how well do you know this codebase?\n");

        println!("Quick start:");
        println!("  gitfam init                   Create a .gitfam.toml config file");
        println!("  gitfam score                  Your familiarity with this repo");
        println!("  gitfam hotspots --team        Busy files few people know\n");

        println!("All commands:");
        println!("  score      Per-folder familiarity for one user");
        println!("  hotspots   Change frequency against familiarity");
        println!("  coverage   Bus factor and single-owner files");
        println!("  compare    Several users side by side");
        println!("  reviewers  Change set familiarity and reviewer suggestions");
        println!("  init       Create default configuration\n");
    }

    println!("Run 'gitfam <command> --help' for details.");
}

/// Commits a contributor needs to be part of `compare --team`.
const TEAM_MIN_COMMITS: usize = 3;

const DEFAULT_CONFIG: &str = r#"# gitfam configuration

[scoring]
# committed | code-coverage | weighted
# mode = "committed"
# blame,commit,review; must sum to 1.0
# weights = "0.5,0.35,0.15"
# never | time:180d | change:50% | combined:365d:50%
# expiration = "never"

[hotspot]
# window_days = 90
# share of the team that counts as "everyone knows it" in team mode
# team_proxy_factor = 0.3

[batch]
# files looked up concurrently
# size = 10
# users or reviewer candidates scored concurrently
# user_size = 3

[reviewers]
# count = 3
# familiarity percentage below which a changed file is unfamiliar
# threshold = 50
# max_candidates = 20
# min_commits = 3
"#;

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gitfam={level},gitfam_scoring={level},gitfam_gitpulse={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Tracked-file tree and signal context for one repository.
struct Workspace {
    root: PathBuf,
    tree: FolderScore,
    ctx: ScoringContext,
}

impl Workspace {
    fn open(path: &Path, config: &FamConfig) -> Result<Self> {
        let root = gitfam_gitpulse::repo_root(path).into_diagnostic()?;
        let filter = PathFilter::load(&root)
            .into_diagnostic()
            .wrap_err("loading .gitfamignore")?;
        let files = gitfam_gitpulse::tracked_files(&root, &filter).into_diagnostic()?;
        if files.is_empty() {
            miette::bail!(miette::miette!(
                help = "Commit some files, or loosen the patterns in .gitfamignore",
                "No tracked files in {}",
                root.display()
            ));
        }
        let tree = build_tree(files);
        let ctx = ScoringContext::new(Arc::new(GitSignals::new(root.clone())))
            .with_batch_sizes(config.batch.size, config.batch.user_size);
        debug!(root = %root.display(), files = tree.file_count, "workspace opened");
        Ok(Self { root, tree, ctx })
    }

    fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    fn tracked(&self) -> HashSet<String> {
        self.tree.file_paths().into_iter().collect()
    }
}

fn scoring_options(
    config: &FamConfig,
    mode: Option<ScoringMode>,
    weights: Option<WeightConfig>,
    expiration: Option<ExpirationConfig>,
) -> Result<ScoringOptions> {
    let mode = match mode {
        Some(mode) => mode,
        None => config.scoring.mode().into_diagnostic()?,
    };
    let weights = match weights {
        Some(weights) => weights,
        None => config.scoring.weights().into_diagnostic()?,
    };
    let expiration = match expiration {
        Some(expiration) => expiration,
        None => config.scoring.expiration().into_diagnostic()?,
    };
    Ok(ScoringOptions {
        mode,
        weights,
        expiration,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => FamConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(".gitfam.toml");
            if default_path.exists() {
                FamConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("loading .gitfam.toml")?
            } else {
                FamConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Score {
            ref path,
            ref user,
            mode,
            weights,
            expiration,
        }) => {
            let options = scoring_options(&config, mode, weights, expiration)?;
            let ws = Workspace::open(path, &config)?;
            let user = gitfam_gitpulse::resolve_user(&ws.root, user.as_deref()).into_diagnostic()?;
            info!(user = user.display_name(), mode = %options.mode, "scoring");
            let result = gitfam_scoring::strategy::compute_familiarity(&ws.tree, &ws.ctx, &user, &options)
                .await
                .into_diagnostic()
                .wrap_err(format!("scoring {}", user.display_name()))?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render::score_markdown(&result, &ws.name())),
                OutputFormat::Text => print!("{}", render::score_text(&result, &ws.name(), use_color)),
            }
        }
        Some(Command::Hotspots {
            ref path,
            ref user,
            team,
            window,
            mode,
        }) => {
            let window = window.unwrap_or(config.hotspot.window_days);
            if window == 0 {
                miette::bail!("--window must be at least 1 day");
            }
            let ws = Workspace::open(path, &config)?;
            let scan = gitfam_gitpulse::scan_history(&ws.root, &ws.tracked(), window, ws.ctx.now)
                .into_diagnostic()?;

            let result = if team {
                let familiarity = hotspots::team_proxy_familiarity(
                    &ws.tree.file_paths(),
                    &scan.file_contributors,
                    scan.contributors.len(),
                    config.hotspot.team_proxy_factor,
                );
                hotspots::compute_hotspots(
                    &ws.tree,
                    &scan.change_frequency,
                    &familiarity,
                    HotspotMode::Team,
                    None,
                    window,
                )
            } else {
                let options = scoring_options(&config, mode, None, None)?;
                let user =
                    gitfam_gitpulse::resolve_user(&ws.root, user.as_deref()).into_diagnostic()?;
                let scored =
                    gitfam_scoring::strategy::compute_familiarity(&ws.tree, &ws.ctx, &user, &options)
                        .await
                        .into_diagnostic()?;
                let familiarity = hotspots::personal_familiarity(&scored.tree);
                hotspots::compute_hotspots(
                    &ws.tree,
                    &scan.change_frequency,
                    &familiarity,
                    HotspotMode::Personal,
                    Some(scored.user_name),
                    window,
                )
            };

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render::hotspots_markdown(&result, &ws.name())),
                OutputFormat::Text => {
                    print!("{}", render::hotspots_text(&result, &ws.name(), use_color))
                }
            }
        }
        Some(Command::Coverage { ref path }) => {
            let ws = Workspace::open(path, &config)?;
            let scan = gitfam_gitpulse::scan_history(
                &ws.root,
                &ws.tracked(),
                config.hotspot.window_days,
                ws.ctx.now,
            )
            .into_diagnostic()?;
            let result = gitfam_scoring::coverage::compute_team_coverage(
                &ws.tree,
                &scan.file_contributors,
                scan.contributors.len(),
            );

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render::coverage_markdown(&result)),
                OutputFormat::Text => print!("{}", render::coverage_text(&result, use_color)),
            }
        }
        Some(Command::Compare {
            ref path,
            ref user,
            team,
            mode,
        }) => {
            let options = scoring_options(&config, mode, None, None)?;
            let ws = Workspace::open(path, &config)?;
            let users: Vec<UserIdentity> = if team {
                gitfam_gitpulse::contributors(&ws.root, TEAM_MIN_COMMITS)
                    .into_diagnostic()?
                    .into_iter()
                    .map(|c| c.identity)
                    .collect()
            } else if user.is_empty() {
                vec![gitfam_gitpulse::resolve_user(&ws.root, None).into_diagnostic()?]
            } else {
                user.iter().map(|u| UserIdentity::from_flag(u)).collect()
            };
            if users.is_empty() {
                miette::bail!(miette::miette!(
                    help = "Pass --user explicitly",
                    "No contributor has {TEAM_MIN_COMMITS} or more commits"
                ));
            }
            info!(users = users.len(), mode = %options.mode, "comparing");
            let result =
                gitfam_scoring::multi_user::compute_multi_user(&ws.tree, &ws.ctx, users, &options)
                    .await
                    .into_diagnostic()?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render::compare_markdown(&result, &ws.name())),
                OutputFormat::Text => print!("{}", render::compare_text(&result, &ws.name(), use_color)),
            }
        }
        Some(Command::Reviewers {
            ref files,
            ref path,
            ref base,
            ref author,
            count,
            threshold,
            mode,
        }) => {
            let mut reviewer_config = config.reviewers.clone();
            if let Some(count) = count {
                reviewer_config.count = count;
            }
            if let Some(threshold) = threshold {
                if threshold > 100 {
                    miette::bail!("--threshold is a percentage (0-100), got {threshold}");
                }
                reviewer_config.threshold = threshold;
            }
            let options = scoring_options(&config, mode, None, None)?;
            let ws = Workspace::open(path, &config)?;

            let mut changed = files.clone();
            if let Some(base) = base {
                changed.extend(gitfam_gitpulse::changed_files(&ws.root, base).into_diagnostic()?);
            }
            changed.sort();
            changed.dedup();
            if changed.is_empty() {
                miette::bail!(miette::miette!(
                    help = "Pass changed files as arguments, or --base <rev> to diff against HEAD",
                    "No changed files to analyze"
                ));
            }

            let author = gitfam_gitpulse::resolve_user(&ws.root, author.as_deref()).into_diagnostic()?;
            let candidates: Vec<UserIdentity> =
                gitfam_gitpulse::contributors(&ws.root, reviewer_config.min_commits)
                    .into_diagnostic()?
                    .into_iter()
                    .map(|c| c.identity)
                    .collect();
            let analysis = gitfam_scoring::reviewers::analyze_change_set(
                &ws.tree,
                &ws.ctx,
                &changed,
                &author,
                candidates,
                options.mode,
                &reviewer_config,
            )
            .await
            .into_diagnostic()?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&analysis).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", render::reviewers_markdown(&analysis)),
                OutputFormat::Text => print!("{}", render::reviewers_text(&analysis, use_color)),
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".gitfam.toml");
            if path.exists() {
                miette::bail!(".gitfam.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .gitfam.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "gitfam", &mut std::io::stdout());
        }
    }

    Ok(())
}

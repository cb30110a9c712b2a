use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use studiopost_core::config::{SiteLayout, StatusPolicy, StudioConfig, load_config};
use studiopost_core::github::{GitHubClient, GitHubClientConfig, load_event_issue};
use studiopost_core::issues::{
    EventIssueSource, IssuePipelineOptions, IssueSource, OpenIssueSweep, run_issue_pipeline,
};
use studiopost_core::media::MediaResolver;
use studiopost_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_layout, normalize_for_display,
    resolve_paths,
};
use studiopost_core::table::{StatusFilter, TablePipelineOptions, locate_input, run_table_pipeline};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "studiopost",
    version,
    about = "Build static-site posts from GitHub issues and submission tables"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create output directories and a default config file")]
    Init(InitArgs),
    #[command(about = "Write one post file per GitHub issue carrying front matter")]
    Issues(IssuesArgs),
    #[command(about = "Build the posts JSON document from the submissions table")]
    Table(TableArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
}

#[derive(Debug, Args)]
struct IssuesArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Webhook event payload (defaults to GITHUB_EVENT_PATH)"
    )]
    event: Option<PathBuf>,
    #[arg(long, help = "Report what would be written without touching files")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct TableArgs {
    #[arg(long, value_name = "PATH", help = "Submissions table (TSV or CSV)")]
    input: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Posts JSON output path")]
    output: Option<PathBuf>,
    #[arg(long, help = "Publish every row not explicitly rejected")]
    permissive: bool,
    #[arg(long, help = "Report what would be written without touching files")]
    dry_run: bool,
}

struct Runtime {
    paths: ResolvedPaths,
    config: StudioConfig,
    layout: SiteLayout,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Issues(args)) => run_issues(&runtime, args),
        Some(Commands::Table(args)) => run_table(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let Runtime {
        paths,
        layout,
        ..
    } = load_runtime(runtime)?;
    let report = init_layout(&paths, &layout, args.force)?;

    println!("Initialized studiopost layout");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    for dir in &report.created_dirs {
        println!("created: {}", normalize_for_display(dir));
    }
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths, &layout);
    Ok(())
}

fn run_issues(runtime: &RuntimeOptions, args: IssuesArgs) -> Result<()> {
    let Runtime {
        paths,
        config,
        layout,
    } = load_runtime(runtime)?;

    let event_path = args
        .event
        .or_else(|| env::var_os("GITHUB_EVENT_PATH").map(PathBuf::from));
    let event_issue = match event_path.as_deref() {
        Some(path) => load_event_issue(path)?,
        None => None,
    };

    let mut source: Box<dyn IssueSource> = match event_issue {
        Some(issue) => Box::new(EventIssueSource::new(issue)),
        None => {
            let client = GitHubClient::new(GitHubClientConfig::from_config(&config)?)?;
            Box::new(OpenIssueSweep::new(client, config.per_page()))
        }
    };

    let report = run_issue_pipeline(
        source.as_mut(),
        &IssuePipelineOptions {
            posts_dir: layout.posts_dir.clone(),
            publish_label: config.publish_label().to_string(),
            write: !args.dry_run,
        },
    )?;

    println!("issues: {} source ({} requests)", report.source, report.requests);
    for outcome in &report.outcomes {
        println!("{}", outcome.describe());
    }
    println!("----");
    if args.dry_run {
        println!("dry run: no files written");
    }
    println!("{}", report.summary());
    print_diagnostics(runtime, &paths, &layout);
    Ok(())
}

fn run_table(runtime: &RuntimeOptions, args: TableArgs) -> Result<()> {
    let Runtime {
        paths,
        config,
        layout,
    } = load_runtime(runtime)?;

    let input = locate_input(
        args.input.as_deref(),
        &layout.data_dir,
        &config.input_candidates(),
    )?;
    let output = args.output.unwrap_or_else(|| layout.table_output.clone());
    let policy = if args.permissive {
        StatusPolicy::Permissive
    } else {
        config.status_policy()
    };

    let report = run_table_pipeline(&TablePipelineOptions {
        input,
        output,
        filter: StatusFilter {
            policy,
            approved: config.approved_statuses(),
            rejected: config.rejected_statuses(),
        },
        resolver: MediaResolver::new(
            &layout.media_root,
            config.media_base_path(),
            config.prefer_year_subfolder(),
        ),
        write: !args.dry_run,
    })?;

    println!("table: {} ({})", normalize_for_display(&report.input), policy.as_str());
    for line in &report.feedback {
        println!("{}", line.describe());
    }
    println!("----");
    if args.dry_run {
        println!(
            "dry run: would write {} posts to {}",
            report.posts.len(),
            normalize_for_display(&report.output)
        );
    } else {
        println!(
            "Wrote {} posts to {}",
            report.posts.len(),
            normalize_for_display(&report.output)
        );
    }
    println!("{}", report.summary());
    print_diagnostics(runtime, &paths, &layout);
    Ok(())
}

fn load_runtime(runtime: &RuntimeOptions) -> Result<Runtime> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    let paths = resolve_paths(&context, &overrides)?;
    let config = load_config(&paths.config_path)?;
    let layout = config.layout(&paths.project_root);
    debug!(
        project_root = %paths.project_root.display(),
        config = %paths.config_path.display(),
        "resolved runtime"
    );
    Ok(Runtime {
        paths,
        config,
        layout,
    })
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths, layout: &SiteLayout) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics(layout));
    }
}

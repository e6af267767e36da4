//! Presto CLI entry point.

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use presto::application::{PostReport, PostTarget};
use presto::commands::{self, CommentExport};
use presto::domain::{CommentId, SkipReason, ThreadKey};
use presto::infra::app_config;
use presto::infra::vcs::{GhCli, PrRef};

#[derive(Parser, Debug)]
#[command(name = "presto")]
#[command(version)]
#[command(about = "Organize, draft and post replies to pull request review comments", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch review comments and create a new review session
    Analyze {
        #[command(flatten)]
        pr: PrArgs,

        /// Directory to create the session in (overrides the config file)
        #[arg(long)]
        sessions_root: Option<PathBuf>,

        /// Also write every comment, threaded, to a single markdown file
        #[arg(long)]
        save: bool,

        /// File for --save (default: <session id>_comments.md)
        #[arg(long, requires = "save")]
        output: Option<PathBuf>,
    },

    /// Add a draft reply to a thread
    Append {
        #[arg(long)]
        session_dir: PathBuf,

        /// Thread number (as in thread_NN) or thread id
        #[arg(long)]
        thread: ThreadKey,

        /// Reply text
        #[arg(long)]
        content: String,
    },

    /// Post drafted replies
    #[command(group(ArgGroup::new("target").required(true).args(["thread", "all"])))]
    Post {
        #[arg(long)]
        session_dir: PathBuf,

        /// Thread number (as in thread_NN) or thread id
        #[arg(long)]
        thread: Option<ThreadKey>,

        /// Post every thread that has a pending draft
        #[arg(long)]
        all: bool,

        /// Show what would be posted without sending anything
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Mark a thread as not needing a reply
    Skip {
        #[arg(long)]
        session_dir: PathBuf,

        /// Thread number (as in thread_NN) or thread id
        thread: ThreadKey,

        #[arg(long, default_value = "manual")]
        reason: SkipReason,
    },

    /// Search a PR's comments for text
    Search {
        #[command(flatten)]
        pr: PrArgs,

        #[arg(long)]
        query: String,
    },

    /// Reply directly to one comment by id
    Reply {
        #[command(flatten)]
        pr: PrArgs,

        #[arg(long)]
        comment_id: CommentId,

        #[arg(long)]
        message: String,
    },

    /// Print the workflow guide
    Guide,
}

#[derive(clap::Args, Debug)]
struct PrArgs {
    /// Repository as owner/repo (optional when --pr is a URL)
    #[arg(long)]
    repo: Option<String>,

    /// PR number, owner/repo#number or PR URL
    #[arg(long)]
    pr: String,
}

impl PrArgs {
    fn resolve(&self) -> Result<PrRef> {
        if let Some(parsed) = PrRef::parse(&self.pr) {
            return Ok(parsed);
        }
        let number: u32 = self
            .pr
            .trim()
            .trim_start_matches('#')
            .parse()
            .with_context(|| format!("invalid PR reference `{}`", self.pr))?;
        let Some(repo) = &self.repo else {
            bail!("--repo owner/repo is required when --pr is a number");
        };
        PrRef::new(repo, number)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let Some(command) = args.command else {
        commands::guide(&mut stdout)?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Guide => commands::guide(&mut stdout)?,
        Commands::Analyze {
            pr,
            sessions_root,
            save,
            output,
        } => {
            let pr = pr.resolve()?;
            let export = save.then(|| output.map_or(CommentExport::Default, CommentExport::Path));
            let mut config = app_config::load_config();
            if sessions_root.is_some() {
                config.sessions_root = sessions_root;
            }
            let gh = GhCli::locate()?;
            commands::analyze(&config, &gh, &pr, export.as_ref(), &mut stdout).await?;
        }
        Commands::Append {
            session_dir,
            thread,
            content,
        } => commands::append(&session_dir, &thread, &content, &mut stdout)?,
        Commands::Post {
            session_dir,
            thread,
            all,
            dry_run,
            yes,
        } => {
            let target = match thread {
                Some(key) if !all => PostTarget::Thread(key),
                _ => PostTarget::All,
            };
            // A dry run never calls `gh`, so it should not require one.
            let gh = match GhCli::locate() {
                Ok(gh) => gh,
                Err(_) if dry_run => GhCli::new("gh"),
                Err(err) => return Err(err),
            };
            let mut confirm = |preview: &PostReport| yes || confirm_post(preview);
            let run =
                commands::post(&session_dir, &gh, &target, dry_run, &mut confirm, &mut stdout)
                    .await?;
            if !run.succeeded() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Skip {
            session_dir,
            thread,
            reason,
        } => commands::skip(&session_dir, &thread, reason, &mut stdout)?,
        Commands::Search { pr, query } => {
            let pr = pr.resolve()?;
            let gh = GhCli::locate()?;
            commands::search(&gh, &pr, &query, &mut stdout).await?;
        }
        Commands::Reply {
            pr,
            comment_id,
            message,
        } => {
            let pr = pr.resolve()?;
            let gh = GhCli::locate()?;
            commands::reply(&gh, &pr, comment_id, &message, &mut stdout).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn confirm_post(preview: &PostReport) -> bool {
    let mut stderr = io::stderr();
    if !io::stdin().is_terminal() {
        let _ = writeln!(
            stderr,
            "Refusing to post {} repl(ies) without confirmation; pass -y to post non-interactively.",
            preview.pending()
        );
        return false;
    }
    let mut preview_out = Vec::new();
    if commands::write_report(preview, &mut preview_out).is_ok() {
        let _ = stderr.write_all(&preview_out);
    }
    let _ = write!(stderr, "Post {} repl(ies) to GitHub? [y/N] ", preview.pending());
    let _ = stderr.flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

//! ModQueue command-line moderation tool.
//!
//! Provides subcommands for submitting edits, inspecting the queue folders,
//! approving, rejecting and merging entries, managing blocks, and
//! generating / validating configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use modqueue_core::config::AppConfig;
use modqueue_core::db::Database;
use modqueue_core::document::{DocumentStore, SqliteDocumentStore};
use modqueue_core::engine::{ActionEngine, BatchReport};
use modqueue_core::errors::ModerationError;
use modqueue_core::interceptor::{Interceptor, Outcome};
use modqueue_core::models::{BatchFilter, BlockSubject, Folder, RevisionId};
use modqueue_core::permissions::{GroupsFile, PermissionOracle, RoleSource, StaticRoles};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ModQueue command-line moderation tool.
#[derive(Parser, Debug)]
#[command(
    name = "modqueue",
    version,
    about = "Submit, review and resolve moderated edits"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/modqueue/config.toml"
    )]
    config: PathBuf,

    /// Identity to act as.
    #[arg(long = "as", global = true, value_name = "ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file and groups file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./modqueue.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Submit an edit. It is applied directly or queued for review.
    Submit {
        /// Page to edit.
        target: String,

        /// File holding the new page text.
        #[arg(short, long)]
        file: PathBuf,

        /// Edit summary.
        #[arg(short, long, default_value = "")]
        summary: String,

        /// Revision the edit was made against (defaults to the current one).
        #[arg(long, conflicts_with = "new_page")]
        base: Option<String>,

        /// The edit creates a page that did not exist.
        #[arg(long)]
        new_page: bool,
    },

    /// List the entries of a folder, newest first.
    List {
        /// Folder: pending, approved, rejected, merged.
        #[arg(short, long, default_value = "pending")]
        folder: String,

        /// Number of results (defaults to the configured folder limit).
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show an entry with its diff and available actions.
    Show {
        /// Entry ID.
        id: i64,
    },

    /// Approve an entry.
    Approve {
        /// Entry ID.
        id: i64,
    },

    /// Approve every matching pending entry.
    ApproveAll(FilterArgs),

    /// Reject an entry.
    Reject {
        /// Entry ID.
        id: i64,
    },

    /// Reject every matching pending entry.
    RejectAll(FilterArgs),

    /// Resolve a conflicted entry with hand-merged text.
    Merge {
        /// Entry ID.
        id: i64,

        /// File holding the merged page text.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Close a pending entry whose author or page is blocked.
    CloseBlocked {
        /// Entry ID.
        id: i64,
    },

    /// Block an author or a page.
    Block(SubjectArgs),

    /// Lift a block.
    Unblock(SubjectArgs),

    /// List active blocks.
    Blocks,

    /// Show recent moderation log entries.
    Log {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Print a page's current text, or its revision history.
    Page {
        /// Page name.
        target: String,

        /// List every revision instead of printing the text.
        #[arg(long)]
        history: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
struct FilterArgs {
    /// Only entries by this author.
    #[arg(long)]
    author: Option<String>,

    /// Only entries for this page.
    #[arg(long)]
    target: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> BatchFilter {
        match (&self.author, &self.target) {
            (Some(author), _) => BatchFilter::Author(author.clone()),
            (None, Some(target)) => BatchFilter::Target(target.clone()),
            (None, None) => BatchFilter::All,
        }
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SubjectArgs {
    /// Author to block or unblock.
    #[arg(long)]
    author: Option<String>,

    /// Page to block or unblock.
    #[arg(long)]
    target: Option<String>,
}

impl SubjectArgs {
    fn to_subject(&self) -> Result<BlockSubject> {
        match (&self.author, &self.target) {
            (Some(author), _) => Ok(BlockSubject::Author(author.clone())),
            (None, Some(target)) => Ok(BlockSubject::Target(target.clone())),
            (None, None) => anyhow::bail!("either --author or --target is required"),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is optional at this point: init and validate run without one.
    let log_level = AppConfig::load_from_file(&cli.config)
        .map(|c| c.store.log_level)
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ModerationError>() {
                Some(m) => {
                    eprintln!("{} [{}]", style::error(&format!("{:#}", e)), m.code());
                    if m.is_transient() {
                        eprintln!("{}", style::dim("The store may recover; retry the command."));
                    }
                }
                None => eprintln!("{}", style::error(&format!("{:#}", e))),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = &cli.config;
    let actor = cli.actor.as_deref();

    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(config),
        Commands::Page { target, history } => {
            let app = App::open(&load_config(config)?)?;
            cmd_page(&app, &target, history).await
        }
        Commands::Submit {
            target,
            file,
            summary,
            base,
            new_page,
        } => {
            let (app, actor) = session(config, actor)?;
            cmd_submit(&app, actor, &target, &file, &summary, base, new_page).await
        }
        Commands::List { folder, limit } => {
            let (app, actor) = session(config, actor)?;
            cmd_list(&app, actor, &folder, limit)
        }
        Commands::Show { id } => {
            let (app, actor) = session(config, actor)?;
            cmd_show(&app, actor, id).await
        }
        Commands::Approve { id } => {
            let (app, actor) = session(config, actor)?;
            let entry = app
                .engine
                .approve(id, actor)
                .await
                .with_context(|| format!("failed to approve entry {id}"))?;
            println!("{}", style::success(&format!("Entry {} approved", entry.id)));
            Ok(())
        }
        Commands::ApproveAll(filter) => {
            let (app, actor) = session(config, actor)?;
            let report = app
                .engine
                .approve_all(actor, &filter.to_filter())
                .await
                .context("failed to approve entries")?;
            print_report("approved", &report);
            Ok(())
        }
        Commands::Reject { id } => {
            let (app, actor) = session(config, actor)?;
            app.engine
                .reject(id, actor)
                .await
                .with_context(|| format!("failed to reject entry {id}"))?;
            println!("{}", style::success(&format!("Entry {id} rejected")));
            Ok(())
        }
        Commands::RejectAll(filter) => {
            let (app, actor) = session(config, actor)?;
            let report = app
                .engine
                .reject_all(actor, &filter.to_filter())
                .await
                .context("failed to reject entries")?;
            print_report("rejected", &report);
            Ok(())
        }
        Commands::Merge { id, file } => {
            let (app, actor) = session(config, actor)?;
            let text = read_text(&file)?;
            app.engine
                .merge(id, actor, &text)
                .await
                .with_context(|| format!("failed to merge entry {id}"))?;
            println!("{}", style::success(&format!("Entry {id} merged")));
            Ok(())
        }
        Commands::CloseBlocked { id } => {
            let (app, actor) = session(config, actor)?;
            app.engine
                .close_blocked(id, actor)
                .await
                .with_context(|| format!("failed to close entry {id}"))?;
            println!("{}", style::success(&format!("Entry {id} closed as blocked")));
            Ok(())
        }
        Commands::Block(subject) => {
            let (app, actor) = session(config, actor)?;
            let subject = subject.to_subject()?;
            app.engine
                .block(actor, &subject)
                .with_context(|| format!("failed to block {subject}"))?;
            println!("{}", style::success(&format!("Blocked {subject}")));
            Ok(())
        }
        Commands::Unblock(subject) => {
            let (app, actor) = session(config, actor)?;
            let subject = subject.to_subject()?;
            app.engine
                .unblock(actor, &subject)
                .with_context(|| format!("failed to unblock {subject}"))?;
            println!("{}", style::success(&format!("Unblocked {subject}")));
            Ok(())
        }
        Commands::Blocks => {
            let (app, actor) = session(config, actor)?;
            cmd_blocks(&app, actor)
        }
        Commands::Log { limit } => {
            let (app, actor) = session(config, actor)?;
            cmd_log(&app, actor, limit)
        }
    }
}

/// Open the store for a command that acts as a reviewer or author.
fn session<'a>(config: &Path, actor: Option<&'a str>) -> Result<(App, &'a str)> {
    let actor = actor.context("--as <ACTOR> is required for this command")?;
    let app = App::open(&load_config(config)?)?;
    Ok((app, actor))
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

struct App {
    pages: Arc<SqliteDocumentStore>,
    interceptor: Interceptor,
    engine: ActionEngine,
}

impl App {
    fn open(config: &AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.store.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                config.store.data_dir.display()
            )
        })?;
        let db = Database::new(config.store.database_path()).context("failed to open database")?;
        db.initialize().context("failed to initialize database")?;
        let db = Arc::new(db);

        let roles: Arc<dyn RoleSource> = match &config.permissions.groups_file {
            Some(path) => Arc::new(GroupsFile::load(path).context("failed to load groups file")?),
            None => {
                tracing::warn!("no groups file configured; every actor is unprivileged");
                Arc::new(StaticRoles::new())
            }
        };
        let oracle = PermissionOracle::new(roles, db.clone(), &config.permissions);

        let pages = Arc::new(SqliteDocumentStore::new(db.clone()));
        let interceptor = Interceptor::new(oracle.clone(), db.clone(), pages.clone(), &config.engine);
        let engine = ActionEngine::new(db, oracle, pages.clone(), &config.engine, &config.queue);

        Ok(Self {
            pages,
            interceptor,
            engine,
        })
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::load_and_validate(path).context("failed to load configuration file")?;
    Ok(config)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    let groups_path = output.with_file_name("groups.toml");

    let default_config = format!(
        r#"# ModQueue Configuration

[store]
data_dir = "/var/lib/modqueue"
log_level = "warn"

[permissions]
review_groups = ["moderator"]
bypass_groups = ["automoderated"]
groups_file = "{groups}"

[queue]
folder_limit = 150

[engine]
document_timeout_ms = 5000
stale_base_retries = 1
"#,
        groups = groups_path.display()
    );

    std::fs::write(output, default_config).context("failed to write config file")?;
    println!("{}", style::success(&format!("Configuration written to {}", output.display())));

    if groups_path.exists() {
        println!("{}", style::warn(&format!("Keeping existing {}", groups_path.display())));
    } else {
        let mut groups = GroupsFile::default();
        groups.add("admin", "moderator");
        groups.add("admin", "automoderated");
        groups
            .save(&groups_path)
            .context("failed to write groups file")?;
        println!("{}", style::success(&format!("Groups written to {}", groups_path.display())));
    }

    println!();
    println!("Next steps:");
    println!("  1. Set data_dir and list your moderators in {}", groups_path.display());
    println!(
        "  2. Validate with: modqueue validate --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All values are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    if let Some(ref path) = config.permissions.groups_file {
        GroupsFile::load(path).context("groups file is invalid")?;
        println!("  [OK] Groups file parses");
    }

    println!();
    println!("Configuration summary:");
    println!("  Data directory : {}", config.store.data_dir.display());
    println!("  Review groups  : {}", config.permissions.review_groups.join(", "));
    println!("  Bypass groups  : {}", config.permissions.bypass_groups.join(", "));
    println!(
        "  Groups file    : {}",
        config
            .permissions
            .groups_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "NOT SET".into())
    );
    println!("  Folder limit   : {}", config.queue.folder_limit);
    println!("  Store timeout  : {}ms", config.engine.document_timeout_ms);
    println!();
    println!("Configuration is valid.");
    Ok(())
}

async fn cmd_submit(
    app: &App,
    actor: &str,
    target: &str,
    file: &Path,
    summary: &str,
    base: Option<String>,
    new_page: bool,
) -> Result<()> {
    let text = read_text(file)?;
    let base = match (base, new_page) {
        (Some(id), _) => Some(RevisionId(id)),
        (None, true) => None,
        (None, false) => app
            .pages
            .current_revision(target)
            .await
            .context("failed to read current revision")?
            .map(|r| r.id),
    };

    let outcome = app
        .interceptor
        .submit(actor, target, base.as_ref(), &text, summary)
        .await
        .with_context(|| format!("failed to submit edit to '{target}'"))?;

    match outcome {
        Outcome::AppliedDirectly { revision } => {
            println!("{}", style::success(&format!("Saved '{target}' as revision {revision}")))
        }
        Outcome::Queued(id) => println!(
            "{}",
            style::warn(&format!("Edit queued for moderation as entry {id}"))
        ),
    }
    Ok(())
}

fn cmd_list(app: &App, actor: &str, folder: &str, limit: Option<u32>) -> Result<()> {
    let folder = Folder::from_str_val(folder).with_context(|| {
        format!("unknown folder '{folder}': use pending, approved, rejected or merged")
    })?;
    let snapshot = app
        .engine
        .list_folder(actor, folder, limit)
        .context("failed to list entries")?;

    if snapshot.is_empty() {
        println!("No entries in {}.", folder);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Page", "Author", "State", "Summary", "Actions", "Created"]);

    for entry in &snapshot.entries {
        let links = app.engine.links_for(entry);
        let actions: Vec<&str> = [
            (links.approve, "approve"),
            (links.reject, "reject"),
            (links.merge, "merge"),
            (links.block, "block"),
            (links.unblock, "unblock"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();

        table.add_row(vec![
            Cell::new(entry.id),
            Cell::new(&entry.target),
            Cell::new(&entry.author),
            style::state_cell(entry.state, entry.conflict_flag),
            Cell::new(&entry.summary),
            Cell::new(actions.join(" ")),
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("{table}");
    println!(
        "{}",
        style::dim(&format!(
            "{} entr{} in {} as of {}",
            snapshot.len(),
            if snapshot.len() == 1 { "y" } else { "ies" },
            folder,
            snapshot.taken_at.format("%H:%M:%S")
        ))
    );
    Ok(())
}

async fn cmd_show(app: &App, actor: &str, id: i64) -> Result<()> {
    let view = app
        .engine
        .show(id, actor)
        .await
        .with_context(|| format!("failed to show entry {id}"))?;
    let entry = &view.entry;

    println!("{}", style::header(&format!("Entry {}", entry.id)));
    println!();
    println!("  Page         : {}", entry.target);
    println!("  Author       : {}{}", entry.author, if view.author_blocked { " (blocked)" } else { "" });
    println!("  State        : {}", entry.state);
    println!("  Folder       : {}", entry.folder());
    println!("  Conflict     : {}", if entry.conflict_flag { "yes" } else { "no" });
    println!(
        "  Base revision: {}",
        entry
            .base_revision
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "(new page)".into())
    );
    println!("  Summary      : {}", entry.summary);
    println!("  Created at   : {}", entry.created_at.to_rfc3339());
    if let Some(ref by) = entry.resolved_by {
        println!("  Resolved by  : {by}");
        println!(
            "  Resolved at  : {}",
            entry.resolved_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
        );
    }

    let links = view.links;
    let actions: Vec<&str> = [
        (links.show, "show"),
        (links.approve, "approve"),
        (links.approve_all, "approve-all"),
        (links.reject, "reject"),
        (links.reject_all, "reject-all"),
        (links.merge, "merge"),
        (links.block, "block"),
        (links.unblock, "unblock"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();
    println!("  Actions      : {}", actions.join(", "));

    println!();
    if view.diff.trim().is_empty() {
        println!("{}", style::dim("(no changes)"));
    } else {
        println!("{}", style::diff(&view.diff));
    }

    if let Some(preview) = &view.merge_preview {
        println!();
        if preview.has_conflicts {
            let regions: Vec<String> = preview
                .conflict_markers
                .iter()
                .map(|m| format!("{}-{}", m.start_line, m.end_line))
                .collect();
            println!(
                "{}",
                style::warn(&format!(
                    "Page has moved; merge overlaps at lines {}",
                    regions.join(", ")
                ))
            );
        } else {
            println!("{}", style::warn("Page has moved; merge applies cleanly"));
        }
        print!("{}", preview.merged_content);
    }
    Ok(())
}

fn cmd_blocks(app: &App, actor: &str) -> Result<()> {
    let blocks = app.engine.list_blocks(actor).context("failed to list blocks")?;
    if blocks.is_empty() {
        println!("No active blocks.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Kind", "Name", "Blocked by", "Since"]);
    for block in &blocks {
        table.add_row(vec![
            Cell::new(block.subject.kind()),
            Cell::new(block.subject.name()),
            Cell::new(&block.blocked_by),
            Cell::new(block.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn cmd_log(app: &App, actor: &str, limit: u32) -> Result<()> {
    let entries = app
        .engine
        .moderation_log(actor, limit)
        .context("failed to list moderation log")?;

    if entries.is_empty() {
        println!("No moderation log entries found.");
        return Ok(());
    }

    println!();
    println!("{}", style::header(&format!("Moderation log (last {limit})")));
    println!();
    for entry in &entries {
        let subject = match (entry.entry_id, entry.target.as_deref()) {
            (Some(id), Some(target)) => format!("#{id} {target}"),
            _ => String::new(),
        };
        let details = match &entry.details {
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        println!(
            "  {}  {:<14} {:<12} {}  {}",
            style::dim(&entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            entry.action,
            entry.actor,
            subject,
            style::dim(&details)
        );
    }
    println!();
    Ok(())
}

async fn cmd_page(app: &App, target: &str, history: bool) -> Result<()> {
    if history {
        let revisions = app
            .pages
            .history(target)
            .context("failed to read page history")?;
        if revisions.is_empty() {
            println!("Page '{target}' does not exist.");
            return Ok(());
        }
        for (n, rev) in revisions.iter().enumerate() {
            println!("  {:>3}  {}  {} bytes", n + 1, rev.id, rev.text.len());
        }
        return Ok(());
    }

    match app
        .pages
        .current_revision(target)
        .await
        .context("failed to read page")?
    {
        Some(rev) => {
            println!("{}", style::dim(&format!("revision {}", rev.id)));
            print!("{}", rev.text);
        }
        None => println!("Page '{target}' does not exist."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn print_report(verb: &str, report: &BatchReport) {
    println!(
        "{}",
        style::success(&format!("{} entr{} {verb}", report.succeeded.len(), if report.succeeded.len() == 1 { "y" } else { "ies" }))
    );
    if !report.conflicted.is_empty() {
        let ids: Vec<String> = report.conflicted.iter().map(|id| id.to_string()).collect();
        println!(
            "{}",
            style::warn(&format!("Edit conflict, left pending: {}", ids.join(", ")))
        );
    }
    for (id, err) in &report.failed {
        println!("{}", style::error(&format!("Entry {id}: {err} [{}]", err.code())));
    }
    if report.total() == 0 {
        println!("{}", style::dim("No matching pending entries."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_args() {
        let cli = Cli::try_parse_from(["modqueue", "--as", "User 2", "reject-all", "--author", "User 5"])
            .unwrap();
        let Commands::RejectAll(filter) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(filter.to_filter(), BatchFilter::Author("User 5".into()));
        assert_eq!(cli.actor.as_deref(), Some("User 2"));

        let cli = Cli::try_parse_from(["modqueue", "approve-all"]).unwrap();
        let Commands::ApproveAll(filter) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(filter.to_filter(), BatchFilter::All);
    }

    #[test]
    fn test_block_needs_exactly_one_subject() {
        assert!(Cli::try_parse_from(["modqueue", "block"]).is_err());
        assert!(
            Cli::try_parse_from(["modqueue", "block", "--author", "a", "--target", "b"]).is_err()
        );
        let cli = Cli::try_parse_from(["modqueue", "block", "--target", "Main Page"]).unwrap();
        let Commands::Block(subject) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(
            subject.to_subject().unwrap(),
            BlockSubject::Target("Main Page".into())
        );
    }

    #[test]
    fn test_submit_base_conflicts_with_new_page() {
        let parsed = Cli::try_parse_from([
            "modqueue", "submit", "Page", "--file", "x.txt", "--base", "r1", "--new-page",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_init_writes_config_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("modqueue.toml");

        cmd_init(&output).unwrap();
        let config = AppConfig::load_from_file(&output).unwrap();
        assert_eq!(config.queue.folder_limit, 150);
        let groups = GroupsFile::load(dir.path().join("groups.toml")).unwrap();
        assert!(groups.groups_of("admin").contains("moderator"));
        assert!(cmd_init(&output).is_err());
    }

    #[test]
    fn test_page_does_not_need_an_identity() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("modqueue.toml");
        std::fs::write(
            &config,
            format!(
                "[store]\ndata_dir = \"{}\"\n",
                dir.path().join("data").display()
            ),
        )
        .unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cli = Cli::try_parse_from([
            "modqueue", "--config", config.to_str().unwrap(), "page", "Main Page",
        ])
        .unwrap();
        rt.block_on(run(cli)).unwrap();

        let cli = Cli::try_parse_from([
            "modqueue", "--config", config.to_str().unwrap(), "list",
        ])
        .unwrap();
        let err = rt.block_on(run(cli)).unwrap_err();
        assert!(err.to_string().contains("--as"));
    }
}

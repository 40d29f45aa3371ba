use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use collectify::catalog::{self, Summary};
use collectify::schema::coerce;
use collectify::{
    retry_rate_limited, Collectify, Config, Listing, Priority, Prompt, RecordId, RetryPolicy,
    Status, StoreError, TodoDraft, TodoPatch, Tool,
};

/// Tool directory, prompt vault and todo list kept in a Google spreadsheet
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Use throwaway in-memory worksheets instead of the spreadsheet
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tool directory
    #[command(subcommand)]
    Tools(ToolsCommand),
    /// Prompt vault
    #[command(subcommand)]
    Prompts(PromptsCommand),
    /// Todo list
    #[command(subcommand)]
    Todos(TodosCommand),
    /// Dashboard counters
    Summary,
    /// Write header rows to empty worksheets
    Init,
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    Categories {
        /// Show every accepted category, not only those in use
        #[arg(long)]
        all: bool,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        icon: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        used: bool,
    },
    /// Delete the tool at a row number shown by `tools list`
    Delete { row: usize },
}

#[derive(Subcommand, Debug)]
enum PromptsCommand {
    List,
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        body: String,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Delete the prompt at a row number shown by `prompts list`
    Delete { row: usize },
}

#[derive(Subcommand, Debug)]
enum TodosCommand {
    List {
        #[arg(long)]
        status: Option<Status>,
    },
    Add {
        title: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long, default_value = "pending")]
        status: Status,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        priority: Option<Priority>,
        /// RFC 3339 timestamp, dd/mm/YYYY, "now", or "" to clear
        #[arg(long)]
        completed_at: Option<String>,
    },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(_) if args.memory => Config::offline(),
        Err(e) => return Err(e),
    };

    // Initialize logging; RUST_LOG wins over the configured level
    let mut logger = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => logger.parse_filters(&filters),
        Err(_) => logger.parse_filters(&config.logging.level),
    };
    logger.init();

    let app = if args.memory {
        log::info!("Using in-memory worksheets");
        Collectify::in_memory(&config)
    } else {
        Collectify::connect(&config)?
    };

    let policy = config.retry_policy();
    if let Err(e) = run(&app, &policy, args.command).await {
        log::error!("Command failed: {}", e);
        eprintln!("❌ {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &Collectify, policy: &RetryPolicy, command: Command) -> Result<(), StoreError> {
    match command {
        Command::Tools(cmd) => run_tools(app, policy, cmd).await,
        Command::Prompts(cmd) => run_prompts(app, policy, cmd).await,
        Command::Todos(cmd) => run_todos(app, policy, cmd).await,
        Command::Summary => {
            let tools = retry_rate_limited(policy, || app.tools.list()).await?;
            let prompts = retry_rate_limited(policy, || app.prompts.list()).await?;
            let todos = retry_rate_limited(policy, || app.todos.list()).await?;
            let summary = Summary::collect(&tools.into_records(), &prompts.into_records());

            println!("📊 Dashboard");
            println!("   Total tools: {}", summary.total_tools);
            println!("   Categories:  {}", summary.categories);
            println!("   Used:        {}", summary.used);
            println!("   Unused:      {}", summary.unused);
            println!("   Prompts:     {}", summary.prompts);
            for (status, count) in catalog::todo_counts(&todos.into_records()) {
                println!("   Todos {:<12} {}", format!("{}:", status), count);
            }
            Ok(())
        }
        Command::Init => {
            for (sheet, written) in [
                (app.tools.sheet(), retry_rate_limited(policy, || app.tools.init()).await?),
                (app.prompts.sheet(), retry_rate_limited(policy, || app.prompts.init()).await?),
                (app.todos.sheet(), retry_rate_limited(policy, || app.todos.init()).await?),
            ] {
                let note = if written { "header written" } else { "already initialized" };
                println!("✅ {}: {}", sheet, note);
            }
            Ok(())
        }
    }
}

async fn run_tools(app: &Collectify, policy: &RetryPolicy, cmd: ToolsCommand) -> Result<(), StoreError> {
    match cmd {
        ToolsCommand::List { category, search } => {
            let listing = retry_rate_limited(policy, || app.tools.list()).await?;
            print_warnings(&listing);

            let matches: Vec<_> = listing
                .records
                .iter()
                .filter(|s| {
                    category
                        .as_deref()
                        .map_or(true, |c| catalog::matches_category(&s.record, c))
                })
                .filter(|s| {
                    search
                        .as_deref()
                        .map_or(true, |q| catalog::matches_name(&s.record, q))
                })
                .collect();

            println!("🧰 Results: {}", matches.len());
            for stored in matches {
                let (row, tool) = (stored.row, &stored.record);
                let used = if tool.used { " ✓" } else { "" };
                println!("{:>4}. {} [{}]{} - {}", row, tool.name, tool.category, used, tool.url);
                if !tool.description.is_empty() {
                    println!("      {}", tool.description);
                }
            }
            Ok(())
        }
        ToolsCommand::Categories { all: true } => {
            for category in app.tools.schema().categories() {
                println!("{}", category);
            }
            Ok(())
        }
        ToolsCommand::Categories { all: false } => {
            let listing = retry_rate_limited(policy, || app.tools.list()).await?;
            for category in catalog::categories_in_use(&listing.into_records()) {
                println!("{}", category);
            }
            Ok(())
        }
        ToolsCommand::Add {
            name,
            url,
            category,
            icon,
            description,
            used,
        } => {
            let tool = Tool {
                name,
                url,
                category,
                icon,
                description,
                used,
            };
            let stored = retry_rate_limited(policy, || app.tools.create(tool.clone())).await?;
            println!("✅ Added {} at row {}", stored.record.name, stored.row);
            Ok(())
        }
        ToolsCommand::Delete { row } => {
            let id = RecordId::Row(row);
            retry_rate_limited(policy, || app.tools.delete(&id)).await?;
            println!("🗑️  Deleted tool at row {}", row);
            Ok(())
        }
    }
}

async fn run_prompts(
    app: &Collectify,
    policy: &RetryPolicy,
    cmd: PromptsCommand,
) -> Result<(), StoreError> {
    match cmd {
        PromptsCommand::List => {
            let listing = retry_rate_limited(policy, || app.prompts.list()).await?;
            print_warnings(&listing);
            if listing.is_empty() {
                println!("ℹ️  No prompts found.");
            }
            for stored in &listing.records {
                let prompt = &stored.record;
                println!("📌 {}. {}", stored.row, prompt.title);
                if !prompt.tags.is_empty() {
                    println!("   Tags: {}", prompt.tags.join(", "));
                }
                println!("{}\n", prompt.body);
            }
            Ok(())
        }
        PromptsCommand::Add { title, body, tags } => {
            let prompt = Prompt {
                title,
                body,
                tags: coerce::tags(&tags),
            };
            let stored = retry_rate_limited(policy, || app.prompts.create(prompt.clone())).await?;
            println!("✅ Prompt added at row {}", stored.row);
            Ok(())
        }
        PromptsCommand::Delete { row } => {
            let id = RecordId::Row(row);
            retry_rate_limited(policy, || app.prompts.delete(&id)).await?;
            println!("🗑️  Deleted prompt at row {}", row);
            Ok(())
        }
    }
}

async fn run_todos(app: &Collectify, policy: &RetryPolicy, cmd: TodosCommand) -> Result<(), StoreError> {
    match cmd {
        TodosCommand::List { status } => {
            let listing = retry_rate_limited(policy, || app.todos.list()).await?;
            print_warnings(&listing);

            let todos: Vec<_> = listing
                .records
                .iter()
                .filter(|s| status.map_or(true, |st| s.record.status == st))
                .collect();
            if todos.is_empty() {
                println!("ℹ️  No todos found.");
            }
            for stored in todos {
                let todo = &stored.record;
                println!(
                    "{}  {:<11} {:<6} {}  (added {})",
                    todo.id,
                    todo.status,
                    todo.priority,
                    todo.title,
                    todo.created_at.format("%Y-%m-%d")
                );
            }
            Ok(())
        }
        TodosCommand::Add {
            title,
            priority,
            status,
        } => {
            let draft = TodoDraft::new(title).priority(priority).status(status);
            let stored = retry_rate_limited(policy, || app.todos.create(draft.clone())).await?;
            println!("✅ Todo added with ID: {}", stored.record.id);
            Ok(())
        }
        TodosCommand::Update {
            id,
            title,
            status,
            priority,
            completed_at,
        } => {
            let completed_at = match completed_at.as_deref() {
                None => None,
                Some("now") => Some(Some(Utc::now())),
                Some(value) => Some(coerce::optional_timestamp(value, "completed_at")?),
            };
            let patch = TodoPatch {
                title,
                status,
                priority,
                completed_at,
            };
            let id = RecordId::Key(id);
            let stored = retry_rate_limited(policy, || app.todos.update(&id, patch.clone())).await?;
            println!("✅ Todo {} updated ({})", stored.record.id, stored.record.status);
            Ok(())
        }
        TodosCommand::Delete { id } => {
            let id = RecordId::Key(id);
            retry_rate_limited(policy, || app.todos.delete(&id)).await?;
            println!("🗑️  Todo {} deleted", id);
            Ok(())
        }
    }
}

fn print_warnings<R>(listing: &Listing<R>) {
    for warning in &listing.warnings {
        println!("⚠️  Skipped {}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delete_commands() {
        let args = Args::try_parse_from(["collectify", "--memory", "tools", "delete", "3"]).unwrap();
        assert!(args.memory);
        assert!(matches!(
            args.command,
            Command::Tools(ToolsCommand::Delete { row: 3 })
        ));

        let args = Args::try_parse_from(["collectify", "tools", "categories", "--all"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Tools(ToolsCommand::Categories { all: true })
        ));
    }

    #[tokio::test]
    async fn test_delete_by_row_commands() {
        let app = Collectify::in_memory(&Config::offline());
        app.tools
            .create(Tool {
                name: "VSCode".into(),
                url: "https://code.visualstudio.com".into(),
                category: "Frontend Tools".into(),
                ..Tool::default()
            })
            .await
            .unwrap();
        app.prompts
            .create(Prompt {
                title: "t".into(),
                body: "b".into(),
                tags: Vec::new(),
            })
            .await
            .unwrap();

        let policy = RetryPolicy::none();
        run_tools(&app, &policy, ToolsCommand::Delete { row: 2 }).await.unwrap();
        run_prompts(&app, &policy, PromptsCommand::Delete { row: 2 }).await.unwrap();

        assert!(app.tools.list().await.unwrap().is_empty());
        assert!(app.prompts.list().await.unwrap().is_empty());
        let err = run_tools(&app, &policy, ToolsCommand::Delete { row: 2 }).await.unwrap_err();
        assert!(err.is_not_found());
    }
}

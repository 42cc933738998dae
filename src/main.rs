//! CraftChain CLI - crafting dependency graphs with gated progress tracking.

use clap::Parser;
use colored::*;
use craftchain::{
    Client, Config, Daemon, DaemonConfig, DependencyTree, Item, NewItem, Store, TreeChild, TreeEntry, is_daemon_running,
};
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("craftchain")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("craftchain.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_store_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Parse an `ITEM_ID:QTY` dependency argument.
fn parse_dep(arg: &str) -> Result<(String, i64)> {
    let (id, qty) = arg
        .rsplit_once(':')
        .ok_or_else(|| eyre!("Invalid dependency '{}', expected ITEM_ID:QTY", arg))?;
    let qty = qty
        .parse::<i64>()
        .with_context(|| format!("Invalid quantity in dependency '{}'", arg))?;
    Ok((id.to_string(), qty))
}

fn format_progress(completed: i64, required: i64) -> ColoredString {
    let text = format!("{}/{}", completed, required);
    if completed >= required {
        text.green()
    } else if completed > 0 {
        text.yellow()
    } else {
        text.normal()
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_item(item: &Item) {
    println!("{}: {}", "ID".bold(), item.id.cyan());
    println!("{}: {}", "Name".bold(), item.name);
    println!("{}: {}", "Project".bold(), item.project_id);
    println!(
        "{}: {}",
        "Crafted".bold(),
        format_progress(item.completed_qty, item.required_qty)
    );
    if !item.contributions.is_empty() {
        println!("{}: {}", "Contributed".bold(), item.contributed_qty());
        for c in &item.contributions {
            println!("  {} {} x{}", c.id.cyan(), c.user_id, c.qty);
        }
    }
    if !item.dependencies.is_empty() {
        println!("{}:", "Requires".bold());
        for edge in &item.dependencies {
            println!("  {} x{}", edge.item_id.cyan(), edge.qty);
        }
    }
    println!("{}: {}", "Created".bold(), item.created_at);
    println!("{}: {}", "Updated".bold(), item.updated_at);
}

fn print_tree(tree: &DependencyTree) {
    let Some(root) = tree.root() else {
        return;
    };
    println!("{} {} x{}", root.name.bold(), root.id.cyan(), root.required_qty);

    // Children pushed in reverse so they print in edge order
    let mut stack: Vec<(usize, &TreeChild)> = root.dependencies.iter().rev().map(|c| (1, c)).collect();
    while let Some((depth, child)) = stack.pop() {
        let indent = "  ".repeat(depth);
        match &child.entry {
            TreeEntry::Item { .. } => {
                if let Some(node) = tree.expanded(child) {
                    println!("{}{} {} x{}", indent, node.name, node.id.cyan(), child.qty);
                    stack.extend(node.dependencies.iter().rev().map(|c| (depth + 1, c)));
                }
            }
            TreeEntry::Truncated { id, message } => {
                println!("{}{} x{} {}", indent, id.cyan(), child.qty, format!("({})", message).yellow());
            }
            TreeEntry::Missing { id } => {
                println!("{}{} x{} {}", indent, id.cyan(), child.qty, "(missing)".red());
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let store_dir = get_store_dir(&cli);

    match cli.command {
        Command::Init => {
            Store::init(&store_dir).context("Failed to initialize craftchain store")?;
            println!("{} Initialized craftchain store in {}", "✓".green(), store_dir.display());
        }

        Command::Create {
            project,
            name,
            required,
            deps,
        } => {
            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let mut spec = NewItem::new(project, name, required);
            for dep in &deps {
                let (id, qty) = parse_dep(dep)?;
                spec = spec.with_dependency(id, qty);
            }

            let item = store.create_item(spec).context("Failed to create item")?;
            println!("{} Created: {} {}", "✓".green(), item.id.cyan(), item.name);
        }

        Command::Link {
            project,
            parent,
            dependency,
            qty,
        } => {
            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let item = store
                .add_dependency(&project, &parent, &dependency, qty)
                .context("Failed to add dependency")?;

            println!(
                "{} {} now requires {} x{}",
                "✓".green(),
                item.name,
                dependency,
                qty
            );
        }

        Command::Import { file } => {
            let content =
                fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let specs: Vec<NewItem> = serde_json::from_str(&content).context("Failed to parse import file")?;

            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let items = store.insert_many(specs).context("Failed to import items")?;
            println!("{} Imported {} item(s)", "✓".green(), items.len());
        }

        Command::Tree { id, json } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let tree = store.tree(&id).context("Failed to build tree")?;

            if json {
                print_json(&tree)?;
            } else {
                print_tree(&tree);
            }
        }

        Command::List { project, json } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let items = store.project_items(&project).context("Failed to list items")?;

            if json {
                print_json(&items)?;
            } else if items.is_empty() {
                println!("{}", "No items found".dimmed());
            } else {
                for item in items {
                    let deps = if item.dependencies.is_empty() {
                        String::new()
                    } else {
                        format!(" [{} deps]", item.dependencies.len())
                    };
                    println!(
                        "{} {} {}{}",
                        format_progress(item.completed_qty, item.required_qty),
                        item.id.cyan(),
                        item.name,
                        deps.dimmed()
                    );
                }
            }
        }

        Command::Show { id, json } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let item = store.get(&id).context("Failed to get item")?;

            match item {
                Some(item) if json => print_json(&item)?,
                Some(item) => print_item(&item),
                None => {
                    eprintln!("{} Item not found: {}", "✗".red(), id);
                    std::process::exit(1);
                }
            }
        }

        Command::Craft { id, qty, user } => {
            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let item = store.craft(&id, &user, qty).context("Failed to craft")?;

            println!(
                "{} Crafted {}: {}",
                "✓".green(),
                item.name,
                format_progress(item.completed_qty, item.required_qty)
            );
        }

        Command::Contribute { id, qty, user } => {
            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let item = store.contribute(&id, &user, qty).context("Failed to contribute")?;

            if let Some(contribution) = item.contributions.last() {
                println!(
                    "{} Contributed {} to {} ({})",
                    "✓".green(),
                    contribution.qty,
                    item.name,
                    contribution.id.cyan()
                );
            }
        }

        Command::Uncontribute {
            item_id,
            contribution_id,
            user,
        } => {
            let mut store = Store::open(&store_dir).context("Failed to open store")?;
            let item = store
                .remove_contribution(&item_id, &user, &contribution_id)
                .context("Failed to remove contribution")?;

            println!(
                "{} {} now has {} contributed",
                "✓".green(),
                item.name,
                item.contributed_qty()
            );
        }

        Command::Activity { project, limit, json } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let records = store.activity(&project, limit).context("Failed to read activity")?;

            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("{}", "No activity".dimmed());
            } else {
                for record in records {
                    println!(
                        "{} {} {} x{} {}",
                        record.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                        record.user_id,
                        record.kind.as_str(),
                        record.quantity,
                        record.item_id.cyan()
                    );
                }
            }
        }

        Command::Progress { project, json } => {
            let store = Store::open(&store_dir).context("Failed to open store")?;
            let progress = store.progress(&project).context("Failed to read progress")?;

            if json {
                print_json(&progress)?;
            } else if progress.is_empty() {
                println!("{}", "No items found".dimmed());
            } else {
                for p in progress {
                    println!(
                        "{} {} {} contributed {}",
                        format_progress(p.completed_qty, p.required_qty),
                        p.id.cyan(),
                        p.name,
                        p.contributed_qty
                    );
                }
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), store_dir.display());

            let store_config = Config::load(&store_dir).context("Failed to load config")?;
            let config = DaemonConfig::from_store_config(&store_dir, &store_config);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&store_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&store_dir, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&store_dir) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&store_dir, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

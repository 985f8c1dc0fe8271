//! freeplane CLI tool
//!
//! Command-line interface for inspecting and creating Freeplane mindmaps with freeplane-dom.
//!
//! ## Commands
//!
//! - `show <file>`: Print the node tree
//! - `find <file>`: Print nodes passing a filter
//! - `get-text <file> <section> <title> <portion>`: Print a text portion of a tagged section
//! - `new <file>`: Write a fresh default map

use clap::{Parser, Subcommand};
use freeplane_dom::{Mindmap, MindmapConfig, Node, NodeFilter};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "freeplane")]
#[command(author, version, about = "A tool for inspecting and creating Freeplane mindmaps", long_about = None)]
struct Cli {
    /// Log filter, e.g. `warn` or `freeplane_dom=debug` (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node tree of a map
    Show {
        /// Path to the map file
        file: PathBuf,

        /// Maximum depth to print (the root node is depth 0)
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Print the id and text of every node passing all given predicates
    Find {
        /// Path to the map file
        file: PathBuf,

        #[arg(long)]
        core: Option<String>,

        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        link: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        style: Option<String>,

        /// Attribute predicate as `name=value`; may be repeated
        #[arg(long = "attr", value_parser = parse_key_value)]
        attributes: Vec<(String, String)>,

        /// Compare whole values instead of substrings
        #[arg(long)]
        exact: bool,

        /// Treat search values as regular expressions
        #[arg(long)]
        regex: bool,

        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the text portion below a section tagged with an attribute `type=<section>`
    GetText {
        /// Path to the map file
        file: PathBuf,
        section: String,
        title: String,
        portion: String,
    },

    /// Write a fresh default map
    New {
        /// Path of the map file to create
        file: PathBuf,

        /// Format version to declare
        #[arg(long)]
        version: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got {arg:?}"))
}

#[derive(Serialize)]
struct FoundNode {
    id: String,
    text: String,
    path: Vec<usize>,
}

fn print_tree(node: &Node, depth: usize, max_depth: Option<usize>) {
    println!("{}{} [{}]", "  ".repeat(depth), node.plaintext(), node.id());
    if max_depth.is_some_and(|max| depth >= max) {
        return;
    }
    for child in node.children() {
        print_tree(&child, depth + 1, max_depth);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Show { file, depth } => {
            let map = Mindmap::open(&file)?;
            println!("freeplane {}", map.version());
            print_tree(&map.rootnode(), 0, depth);
            Ok(())
        }

        Commands::Find {
            file,
            core,
            id,
            link,
            icon,
            style,
            attributes,
            exact,
            regex,
            ignore_case,
            json,
        } => {
            let map = Mindmap::open(&file)?;
            let mut filter = NodeFilter::new()
                .exact(exact)
                .regex(regex)
                .case_insensitive(ignore_case);
            if let Some(core) = core {
                filter = filter.core(&core);
            }
            if let Some(id) = id {
                filter = filter.id(&id);
            }
            if let Some(link) = link {
                filter = filter.link(&link);
            }
            if let Some(icon) = icon {
                filter = filter.icon(&icon);
            }
            if let Some(style) = style {
                filter = filter.style(&style);
            }
            for (name, value) in attributes {
                filter = filter.attribute(&name, &value);
            }

            let root = map.rootnode();
            let found: Vec<FoundNode> = map
                .find_nodes(&filter)
                .iter()
                .map(|node| FoundNode {
                    id: node.id(),
                    text: node.plaintext(),
                    path: root.get_indexchain_until(node),
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for node in &found {
                    println!("{}\t{}", node.id, node.text);
                }
                eprintln!("{} node(s) found", found.len());
            }
            Ok(())
        }

        Commands::GetText {
            file,
            section,
            title,
            portion,
        } => {
            let map = Mindmap::open(&file)?;
            match map.text_portion(&section, &title, &portion) {
                Some(text) => {
                    println!("{text}");
                    Ok(())
                }
                None => Err(format!("no text found for {section}/{title}/{portion}").into()),
            }
        }

        Commands::New {
            file,
            version,
            config,
        } => {
            let config = match config {
                Some(path) => MindmapConfig::load(&path)?,
                None => MindmapConfig::default(),
            };
            let map = Mindmap::with_config(&config);
            if let Some(version) = version {
                map.set_version(&version);
            }
            map.save(&file)?;
            println!("Created {} (freeplane {})", file.display(), map.version());
            Ok(())
        }
    }
}

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use linemark::{MetadataStore, Position, Workspace};

#[derive(Parser)]
#[command(name = "linemark", about = "Track bookmarked lines in text files")]
struct Cli {
    /// File to operate on
    file: PathBuf,

    /// Metadata sidecar file (defaults to ~/.linemark-metadata.json)
    #[arg(long)]
    metadata: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List bookmarked lines
    List,
    /// Add a bookmark on a line
    Add { line: usize },
    /// Remove the bookmark on a line
    Remove { line: usize },
    /// Toggle the bookmark on a line
    Toggle { line: usize },
    /// Show the next bookmarked line after a line, wrapping around
    Next { line: usize },
    /// Show the previous bookmarked line before a line, wrapping around
    Prev { line: usize },
}

/// Looks in $HOME first, falling back to the current directory.
fn default_metadata_path() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => Path::new(&home).join(".linemark-metadata.json"),
        Err(_) => PathBuf::from(".linemark-metadata.json"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let metadata_path = cli.metadata.unwrap_or_else(default_metadata_path);
    let store = MetadataStore::open(metadata_path)?;
    let mut workspace = Workspace::new(store);
    let index = workspace.open_file(cli.file)?;

    match cli.command {
        Command::List => {
            for line in workspace.bookmarked_lines() {
                let text = workspace.current_document().line(line).unwrap_or("");
                println!("{line}: {text}");
            }
        }
        Command::Add { line } => {
            workspace.add_bookmark_at(None, Some(Position::new(line, 0)));
            workspace.document_saved(index)?;
        }
        Command::Remove { line } => {
            workspace.remove_bookmark_at(None, Some(Position::new(line, 0)));
            workspace.document_saved(index)?;
        }
        Command::Toggle { line } => {
            workspace.toggle_bookmark_at(None, Some(Position::new(line, 0)));
            workspace.document_saved(index)?;
        }
        Command::Next { line } => {
            let selection = workspace.goto_next_bookmark(None, Some(Position::new(line, 0)));
            report(&workspace, selection);
        }
        Command::Prev { line } => {
            let selection = workspace.goto_previous_bookmark(None, Some(Position::new(line, 0)));
            report(&workspace, selection);
        }
    }

    Ok(())
}

fn report(workspace: &Workspace, selection: Option<linemark::Range>) {
    match selection {
        Some(selection) => {
            let line = selection.start.line;
            let text = workspace.current_document().line(line).unwrap_or("");
            println!("{line}: {text}");
        }
        None => println!("no bookmarks"),
    }
}

//! Command line interface

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::error::TaskError;
use crate::task::{Priority, Status, Task, TaskFields};
use crate::task_store::TaskStore;

#[derive(Debug, Parser)]
#[command(name = "taskboard", version, about = "Kanban task board for the terminal")]
pub struct Cli {
    /// Directory holding the task file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/taskboard/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive board (default)
    Board,
    /// Add a new task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        category: String,
        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// todo, in-progress, review or done
        #[arg(short, long, default_value = "todo")]
        status: Status,
    },
    /// Edit a task; omitted fields keep their current value
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
    },
    /// Move a task to another column
    Move { id: u64, status: Status },
    /// Delete a task
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List tasks by column, newest first
    List,
    /// Show task counts
    Stats,
    /// Show a single task
    Show { id: u64 },
}

/// Run a one-shot command. `confirm` is asked before deleting.
pub fn execute<W: Write>(
    command: Command,
    store: &mut TaskStore,
    out: &mut W,
    confirm: &mut dyn FnMut(&str) -> io::Result<bool>,
) -> anyhow::Result<()> {
    match command {
        Command::Board => bail!("the board needs an interactive terminal"),
        Command::Add {
            title,
            description,
            category,
            priority,
            status,
        } => {
            let fields = TaskFields::new(title, description, category, priority);
            let task = store.create(fields, status)?;
            writeln!(out, "Task added successfully! (#{})", task.id)?;
        }
        Command::Edit {
            id,
            title,
            description,
            category,
            priority,
            status,
        } => {
            let current = store.get(id).ok_or(TaskError::NotFound { id })?.fields();
            let fields = TaskFields {
                title: title.unwrap_or(current.title),
                description: description.unwrap_or(current.description),
                category: category.unwrap_or(current.category),
                priority: priority.unwrap_or(current.priority),
            };
            let task = store.update(id, fields, status)?;
            writeln!(out, "Task updated successfully! (#{})", task.id)?;
        }
        Command::Move { id, status } => {
            store.move_to(id, status)?;
            writeln!(out, "Task moved to {}!", status.label())?;
        }
        Command::Delete { id, yes } => {
            if store.get(id).is_none() {
                return Err(TaskError::NotFound { id }.into());
            }
            if !yes && !confirm("Are you sure you want to delete this task? [y/N] ")? {
                writeln!(out, "Cancelled")?;
                return Ok(());
            }
            if store.delete(id)? {
                writeln!(out, "Task deleted successfully!")?;
            }
        }
        Command::List => print_list(store, out)?,
        Command::Stats => {
            let stats = store.stats();
            writeln!(out, "Total: {}", stats.total)?;
            for status in Status::ALL {
                writeln!(out, "{}: {}", status.label(), stats.count(status))?;
            }
        }
        Command::Show { id } => {
            let task = store.get(id).ok_or(TaskError::NotFound { id })?;
            print_card(task, out)?;
        }
    }
    Ok(())
}

fn print_list<W: Write>(store: &TaskStore, out: &mut W) -> io::Result<()> {
    for (status, tasks) in store.list().iter() {
        writeln!(out, "{} ({}):", status.label(), tasks.len())?;
        if tasks.is_empty() {
            writeln!(out, "  {}", status.empty_text())?;
        }
        for task in tasks {
            writeln!(
                out,
                "- [#{}] {} ({}, {}) {}",
                task.id,
                task.title,
                if task.category.is_empty() { "-" } else { task.category.as_str() },
                task.priority,
                task.created_on()
            )?;
        }
    }
    Ok(())
}

fn print_card<W: Write>(task: &Task, out: &mut W) -> io::Result<()> {
    writeln!(out, "#{} {}", task.id, task.title)?;
    writeln!(out, "  {}", task.display_description())?;
    writeln!(out, "  Status:   {}", task.status.label())?;
    writeln!(out, "  Priority: {}", task.priority.label())?;
    if !task.category.is_empty() {
        writeln!(out, "  Category: {}", task.category)?;
    }
    writeln!(out, "  Created:  {}", task.created_on())
}

/// Ask on stdout, read a y/N answer from stdin
pub fn prompt_yes_no(question: &str) -> io::Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

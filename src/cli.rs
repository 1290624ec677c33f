use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskpad", version, about = "Minimal server-rendered task tracker")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to a taskpad.yml config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Task file (JSON)
    #[arg(long, global = true, env = "TASKPAD_DATA")]
    pub data: Option<PathBuf>,
    /// Listen address for the web interface, e.g. 127.0.0.1:8080
    #[arg(long, global = true, env = "TASKPAD_ADDR")]
    pub addr: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web interface (default)
    Serve,
    /// Print tasks
    List {
        /// Only tasks whose title or description contains this text
        #[arg(long)]
        q: Option<String>,
        /// Only tasks with this priority (Low, Medium, High)
        #[arg(long)]
        priority: Option<String>,
    },
    /// Add a new task
    Add {
        /// Title of the task
        title: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Low, Medium or High (defaults to Medium)
        #[arg(long)]
        priority: Option<String>,
        /// Due date in YYYY-MM-DD format
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task as completed
    Complete {
        /// Task id
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task id
        id: String,
    },
}

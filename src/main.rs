use anyhow::Result;
use clap::Parser;
use taskpad::cli::{Cli, Command};
use taskpad::commands;
use taskpad::config::Overrides;
use taskpad::storage::TaskStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let command = args.command.unwrap_or(Command::Serve);
    let config = commands::load_config(Overrides {
        config: args.global.config,
        addr: args.global.addr,
        data_file: args.global.data,
    })?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log.as_str().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = TaskStore::new(&config.data_file);
    match command {
        Command::Serve => commands::serve(config).await,
        Command::List { q, priority } => commands::list(&store, q, priority),
        Command::Add {
            title,
            description,
            priority,
            due,
        } => commands::add(&store, title, description, priority, due),
        Command::Complete { id } => commands::complete(&store, id),
        Command::Delete { id } => commands::delete(&store, id),
    }
}

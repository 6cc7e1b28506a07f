use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use funnel_rs::config::FunnelConfig;
use funnel_rs::funnel::{
    Funnel, FunnelLoader, LoggingObserver, NavigationCommand, QueryBinding,
};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a funnel definition and print its schema per step
    Validate {
        /// Path to the funnel definition
        #[arg(short, long)]
        file: String,
    },
    /// Apply navigation commands and print the resulting state
    Replay {
        /// Path to the funnel definition
        #[arg(short, long)]
        file: String,

        /// Step to start from (defaults to the first step)
        #[arg(short, long)]
        initial: Option<String>,

        /// Commands such as `push:experience:{"category":"cooking"}`, `back`, `go:price`
        #[arg(short, long = "op")]
        ops: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = FunnelConfig::from_env()?;
    let loader = FunnelLoader::new();

    match args.command {
        Commands::Validate { file } => {
            let def = loader
                .load_definition(&file)
                .with_context(|| format!("failed to load funnel from {}", file))?;

            println!("Funnel '{}' is valid ({} steps)", def.name, def.len());
            for step in &def.steps {
                let required = def.required_fields(step.name.as_str())?;
                println!(
                    "  {:<16} collects {:?}, requires {:?}",
                    step.name.as_str(),
                    step.owned_fields(),
                    required
                );
            }
        }
        Commands::Replay { file, initial, ops } => {
            let def = loader
                .load_definition(&file)
                .with_context(|| format!("failed to load funnel from {}", file))?;

            let binding = QueryBinding::parse(&config.base_url, &config.funnel_id)?;
            let mut builder = Funnel::builder(def)
                .config(&config)
                .binding(binding)
                .observer(LoggingObserver);
            if let Some(step) = initial {
                builder = builder.initial_step(step);
            }
            let mut funnel = builder.build()?;

            for op in &ops {
                let command: NavigationCommand = op.parse()?;
                if let Err(e) = funnel.apply(command) {
                    log::warn!("Command '{}' failed: {}", op, e);
                }
            }

            let url = funnel
                .binding()
                .and_then(|b| b.location())
                .map(|u| u.to_string());

            let output = json!({
                "state": funnel.state(),
                "progress": funnel.progress(),
                "diagnostics": funnel.diagnostics(),
                "url": url,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

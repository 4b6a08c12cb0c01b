mod smoke;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onetable::schema::table_definition;
use onetable::Config;

/// onetable - Single-table access layer for the social data model
#[derive(Parser, Debug)]
#[command(name = "onetable")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the table
    #[arg(long, global = true, env = "ONETABLE_TABLE_NAME")]
    table_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the table definition: primary key and the seven index slots
    Schema {
        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run the access-layer scenarios against a storage engine
    Smoke {
        /// Storage engine to run against
        #[arg(long, value_enum, default_value_t = Backend::Inmemory, env = "ONETABLE_BACKEND")]
        backend: Backend,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Inmemory,
    Dynamodb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onetable=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(table_name) = cli.table_name {
        config.table_name = table_name;
    }

    match cli.command {
        Command::Schema { json } => {
            let definition = table_definition(&config.table_name);
            if json {
                println!("{}", serde_json::to_string_pretty(&definition)?);
            } else {
                print!("{definition}");
            }
        }
        Command::Smoke { backend } => {
            let table = smoke::build_table(backend, &config).await?;
            smoke::run(table).await?;
        }
    }

    Ok(())
}

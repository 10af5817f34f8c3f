//! Conveyor CLI
//!
//! Constructs schematics and inspects their effective models.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use conveyor::{builtin, Conveyor, ConveyorConfig, ProductType, Stage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Construct schematics with staged plugin pipelines")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Construct a schematic and everything it requires
    Construct {
        /// Schematic definition or the directory holding it
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Stage to construct to (CLEAN, COMPILE, TEST, ARCHIVE, PUBLISH)
        #[arg(short, long)]
        stage: Option<Stage>,

        /// Print the products as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective model of a schematic as JSON
    Effective {
        /// Schematic definition or the directory holding it
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ConveyorConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if let Err(e) = run(cli.command, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: ConveyorConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Construct { path, stage, json } => {
            let stage = stage.unwrap_or(config.construction.stage);
            let conveyor = Conveyor::from_config(config, builtin::catalog())?;
            let products = conveyor.construct(&path, stage)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&products)?);
                return Ok(());
            }

            for constructed in products.schematics() {
                println!("✅ {}", constructed.coordinates);
                for (product, product_type) in constructed.products.iter() {
                    if product_type != ProductType::SchematicDefinition {
                        println!("   └─ {} {}", product_type, product.display());
                    }
                }
            }
            Ok(())
        }

        Commands::Effective { path } => {
            let conveyor = Conveyor::from_config(config, builtin::catalog())?;
            let model = conveyor.effective_model(&path)?;
            println!("{}", serde_json::to_string_pretty(&model)?);
            Ok(())
        }
    }
}

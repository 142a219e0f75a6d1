//! Action State CLI - Inspect and exercise schema.org Actions
//!
//! Provides subcommands for parsing constraints, printing compiled schemas,
//! extracting state and variables, validating, and simulating a perform.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use potential_action::engine::spec::{parse_compact, parse_spec};
use potential_action::engine::{
    ActionState, ActionStore, HandlerInit, Mode, Node, StoreConfig, VariableMap, build_schema,
    extract_variables, validate,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "action-state")]
#[command(about = "Constraint-driven state manager for schema.org Actions", long_about = None)]
struct Cli {
    /// Store configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Input,
    Output,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Input => Mode::Input,
            ModeArg::Output => Mode::Output,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a PropertyValueSpecification (compact string or JSON object)
    Parse {
        /// Spec text, e.g. "required maxlength=100 name=q"
        spec: String,
    },

    /// Print the compiled schema of an action
    Schema {
        /// Action file (JSON)
        action: PathBuf,

        /// Marker family to compile
        #[arg(long, value_enum, default_value = "input")]
        mode: ModeArg,
    },

    /// Print the initial state extracted from an action
    State {
        /// Action file (JSON)
        action: PathBuf,
    },

    /// Print the named variables for a state
    Variables {
        /// Action file (JSON)
        action: PathBuf,

        /// State file (defaults to the action's initial state)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Marker family to read
        #[arg(long, value_enum, default_value = "input")]
        mode: ModeArg,
    },

    /// Validate a state against an action's schema
    Validate {
        /// Action file (JSON)
        action: PathBuf,

        /// State file (defaults to the action's initial state)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Marker family to validate
        #[arg(long, value_enum, default_value = "input")]
        mode: ModeArg,
    },

    /// Perform the action against a canned handler response
    Simulate {
        /// Action file (JSON)
        action: PathBuf,

        /// Response the handler resolves with
        #[arg(long)]
        response: PathBuf,

        /// State to start from (defaults to the action's initial state)
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

fn read_node(path: &Path) -> Result<Node> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let node = serde_json::from_str(&data).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(node)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn store_for(action: Node, config: StoreConfig, response: Node) -> Result<ActionStore> {
    let handler = move |_request: ActionState, _vars: VariableMap, _init: HandlerInit| {
        let response = response.clone();
        async move { anyhow::Ok(response) }
    };
    Ok(ActionStore::with_config(action, handler, config)?)
}

fn initial_or(action: &Node, config: &StoreConfig, state: Option<&PathBuf>) -> Result<Node> {
    match state {
        Some(path) => read_node(path),
        None => Ok(store_for(action.clone(), config.clone(), Node::object())?.state()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };

    match cli.command {
        Commands::Parse { spec } => {
            let record = if spec.trim_start().starts_with('{') {
                let node: Node = serde_json::from_str(&spec).context("Spec is not valid JSON")?;
                parse_spec(&node)?
            } else {
                parse_compact(&spec)?
            };
            print_json(&serde_json::to_value(&record)?)?;
            if let Some(compact) = record.to_compact() {
                println!("compact: {}", compact);
            }
        }

        Commands::Schema { action, mode } => {
            let action = read_node(&action)?;
            let schema = build_schema(&action, mode.into())?;
            print_json(&schema.describe())?;
        }

        Commands::State { action } => {
            let action = read_node(&action)?;
            let store = store_for(action, config, Node::object())?;
            print_json(&store.state().to_json())?;
        }

        Commands::Variables {
            action,
            state,
            mode,
        } => {
            let action = read_node(&action)?;
            let state = initial_or(&action, &config, state.as_ref())?;
            let variables = extract_variables(&action, &state, mode.into())?;
            let json: serde_json::Map<String, serde_json::Value> = variables
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();
            print_json(&serde_json::Value::Object(json))?;
        }

        Commands::Validate {
            action,
            state,
            mode,
        } => {
            let action = read_node(&action)?;
            let state = initial_or(&action, &config, state.as_ref())?;
            let schema = build_schema(&action, mode.into())?;
            print_json(&serde_json::to_value(validate(&schema, &state))?)?;
            if let Err(err) = schema.check(&state) {
                println!("first violation: {}", err);
            }
        }

        Commands::Simulate {
            action,
            response,
            state,
        } => {
            let action = read_node(&action)?;
            let response = read_node(&response)?;
            let store = store_for(action, config, response)?;
            if let Some(path) = state {
                store.set_state(read_node(&path)?);
            }

            let result = store.perform().await;
            print_json(&store.state().to_json())?;
            if let Err(err) = result {
                println!("perform failed: {}", err);
            }
            store.teardown();
        }
    }

    Ok(())
}

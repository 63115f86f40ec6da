//! twin-authz: offline policy decisions and restriction-rule validation.
//!
//! ```bash
//! twin-authz check --policy lamp.json --resource thing:/features/switch \
//!     --subject user:alice --permission WRITE
//! TWIN_AUTHZ_RULES=rules.json twin-authz can-create --resource-type thing \
//!     --namespace org.acme --subject user:alice
//! ```
//!
//! Exit status is 0 when the decision is "allowed", 1 when it is "denied",
//! and 2 on configuration or input errors.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::Outcome;

#[derive(Parser)]
#[command(name = "twin-authz")]
#[command(about = "Evaluate digital-twin policies and creation restrictions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether subjects hold permissions at a resource
    Check {
        /// Policy snapshot (JSON)
        #[arg(long)]
        policy: PathBuf,

        /// Policies the snapshot imports from (JSON, repeatable)
        #[arg(long = "import")]
        imports: Vec<PathBuf>,

        /// Target resource, e.g. thing:/features/switch
        #[arg(long)]
        resource: String,

        /// Caller subject (repeatable)
        #[arg(long = "subject", required = true)]
        subjects: Vec<String>,

        /// Required permission (repeatable)
        #[arg(long = "permission", required = true)]
        permissions: Vec<String>,

        /// Also accept permissions granted below the target
        #[arg(long)]
        partial: bool,
    },
    /// List the subjects that hold permissions at a resource
    Subjects {
        #[arg(long)]
        policy: PathBuf,

        #[arg(long = "import")]
        imports: Vec<PathBuf>,

        #[arg(long)]
        resource: String,

        #[arg(long = "permission", required = true)]
        permissions: Vec<String>,
    },
    /// Check whether creating an entity is allowed by the restriction rules
    CanCreate {
        /// Restriction rules (JSON); no rules means no restriction
        #[arg(long, env = "TWIN_AUTHZ_RULES")]
        rules: Option<PathBuf>,

        #[arg(long)]
        resource_type: String,

        #[arg(long)]
        namespace: String,

        #[arg(long = "subject")]
        subjects: Vec<String>,

        /// Definition of the new thing, if any
        #[arg(long)]
        definition: Option<String>,
    },
    /// Enforce a decoded signal against a policy snapshot and the rules
    Enforce {
        /// Signal (JSON)
        #[arg(long)]
        signal: PathBuf,

        /// Policy snapshot of the addressed entity; omit for a new entity
        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long = "import")]
        imports: Vec<PathBuf>,

        #[arg(long, env = "TWIN_AUTHZ_RULES")]
        rules: Option<PathBuf>,
    },
    /// Compile the restriction rules and report problems
    ValidateRules {
        #[arg(long, env = "TWIN_AUTHZ_RULES")]
        rules: PathBuf,
    },
}

fn run(command: Commands) -> anyhow::Result<Outcome> {
    match command {
        Commands::Check {
            policy,
            imports,
            resource,
            subjects,
            permissions,
            partial,
        } => commands::check(&policy, &imports, &resource, &subjects, &permissions, partial),
        Commands::Subjects {
            policy,
            imports,
            resource,
            permissions,
        } => commands::subjects(&policy, &imports, &resource, &permissions),
        Commands::CanCreate {
            rules,
            resource_type,
            namespace,
            subjects,
            definition,
        } => commands::can_create(
            rules.as_deref(),
            &resource_type,
            &namespace,
            &subjects,
            definition.as_deref(),
        ),
        Commands::Enforce {
            signal,
            policy,
            imports,
            rules,
        } => commands::enforce_signal(&signal, policy.as_deref(), &imports, rules.as_deref()),
        Commands::ValidateRules { rules } => commands::validate_rules(&rules),
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(outcome) => {
            if !outcome.detail.is_empty() {
                println!("{}", outcome.detail);
            }
            if outcome.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

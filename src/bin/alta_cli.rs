//! Onboarding Form Command Line Interface
//!
//! Exercises the onboarding core against a live backend or in memory.
//!
//! # Usage
//!
//! ```bash
//! # Propose the institutional email for a name
//! alta_cli email "María José" "Del Río"
//!
//! # Check a field value against the backend
//! alta_cli check curp PEJJ800101HDFRRN09
//! alta_cli rfc ABC123456XYZ
//!
//! # List the positions of an area
//! alta_cli positions 2
//!
//! # Inspect or clear the persisted duplicate override
//! alta_cli override show --session 6f1c2a4e-0000-4000-8000-000000000000
//!
//! # Walk through a complete onboarding against an in-memory backend
//! alta_cli demo
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use alta_colaborador::area::{AreaSelection, AreaRules};
use alta_colaborador::client::{
    verify_value, HttpVerificationClient, InMemoryVerificationClient, Position,
};
use alta_colaborador::documents::DocumentStager;
use alta_colaborador::gate::VerificationOutcome;
use alta_colaborador::override_store::{FileOverrideStore, OverrideStore};
use alta_colaborador::submission::FormData;
use alta_colaborador::validation::FormatRules;
use alta_colaborador::{AltaConfig, FieldKey, FormSession};

#[derive(Parser)]
#[command(name = "alta_cli")]
#[command(version)]
#[command(about = "Employee onboarding form core: email proposal, duplicate checks and demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (defaults to ALTA_* environment variables)
    #[arg(long, short, global = true, env = "ALTA_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose the institutional email for a first name and surname
    Email { first: String, last: String },

    /// Check whether a value is already registered
    Check {
        /// correo, rfc, curp or nss
        field: FieldKey,
        value: String,
    },

    /// Look up a collaborator by RFC
    Rfc { value: String },

    /// List the positions of an area
    Positions { area_id: u32 },

    /// Inspect the persisted duplicate override
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },

    /// Run a full onboarding against an in-memory backend
    Demo,
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Show the stored override for a session
    Show {
        #[arg(long)]
        session: Option<Uuid>,
    },
    /// Delete the stored override
    Clear,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let format = cli.format;

    match cli.command {
        Commands::Email { first, last } => cmd_email(&config, &first, &last, format),
        Commands::Check { field, value } => cmd_check(&config, field, &value, format).await,
        Commands::Rfc { value } => cmd_check(&config, FieldKey::TaxId, &value, format).await,
        Commands::Positions { area_id } => cmd_positions(&config, area_id, format).await,
        Commands::Override { action } => cmd_override(&config, action, format),
        Commands::Demo => cmd_demo(&config, format).await,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AltaConfig> {
    match path {
        Some(path) => AltaConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AltaConfig::from_env().context("Invalid ALTA_* environment configuration"),
    }
}

fn print(format: OutputFormat, value: serde_json::Value, pretty: String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Pretty => println!("{}", pretty),
    }
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

fn cmd_email(config: &AltaConfig, first: &str, last: &str, format: OutputFormat) -> Result<()> {
    let rules = FormatRules::new(&config.email_domain)?;
    let email = rules
        .candidate_email(first, last)
        .with_context(|| format!("No email can be built from '{}' '{}'", first, last))?;
    print(format, json!({ "email": email }), email.clone())
}

async fn cmd_check(
    config: &AltaConfig,
    field: FieldKey,
    value: &str,
    format: OutputFormat,
) -> Result<()> {
    let client = HttpVerificationClient::from_config(config)?;
    match verify_value(&client, field, value).await {
        VerificationOutcome::Clear => print(
            format,
            json!({ "field": field.wire_name(), "value": value, "duplicate": false }),
            format!("{} '{}' disponible", field.label(), value),
        ),
        VerificationOutcome::Duplicate(conflict) => {
            let existing = conflict
                .existing
                .as_ref()
                .map(|c| format!("\n  {} ({}) - {} / {}", c.name, c.email, c.area, c.status))
                .unwrap_or_default();
            print(
                format,
                json!({
                    "field": field.wire_name(),
                    "value": value,
                    "duplicate": true,
                    "existing": conflict.existing,
                }),
                format!("{} '{}' ya registrado{}", field.label(), value, existing),
            )
        }
        VerificationOutcome::Failed(e) => Err(e).context("Verification failed"),
    }
}

async fn cmd_positions(config: &AltaConfig, area_id: u32, format: OutputFormat) -> Result<()> {
    let client = HttpVerificationClient::from_config(config)?;
    let selection = AreaSelection::resolve(area_id, AreaRules::from_config(config), &client)
        .await
        .with_context(|| format!("Failed to load positions for area {}", area_id))?;

    let lines = selection
        .positions
        .iter()
        .map(|p| format!("{:>4}  {}", p.id, p.name))
        .collect::<Vec<_>>()
        .join("\n");
    print(
        format,
        json!({ "area_id": area_id, "commercial": selection.commercial, "positions": selection.positions }),
        lines,
    )
}

fn cmd_override(config: &AltaConfig, action: OverrideAction, format: OutputFormat) -> Result<()> {
    let path = config
        .override_file
        .clone()
        .ok_or_else(|| anyhow!("ALTA_OVERRIDE_FILE is not set"))?;

    match action {
        OverrideAction::Show { session } => {
            // Opening with another session id deletes the record, so only
            // read through the store when the session is known.
            let session = session.ok_or_else(|| anyhow!("--session is required"))?;
            let store = FileOverrideStore::open_session(&path, session)?;
            let current = store.current().cloned();
            let pretty = match &current {
                Some(o) => format!("{} '{}' permitido como duplicado", o.field.label(), o.value),
                None => "Sin excepción registrada".to_string(),
            };
            print(format, json!({ "override": current }), pretty)
        }
        OverrideAction::Clear => {
            let mut store = FileOverrideStore::open_session(&path, Uuid::new_v4())?;
            store.clear()?;
            print(format, json!({ "cleared": true }), "Excepción eliminada".to_string())
        }
    }
}

async fn cmd_demo(config: &AltaConfig, format: OutputFormat) -> Result<()> {
    let demo_config = AltaConfig {
        name_debounce_ms: 0,
        field_debounce_ms: 0,
        override_file: None,
        ..config.clone()
    };

    let client = InMemoryVerificationClient::new();
    client.set_positions(
        3,
        vec![Position {
            id: 11,
            name: "Auxiliar contable".to_string(),
        }],
    );
    client.register(FieldKey::TaxId, "ABC123456XYZ");

    let session = FormSession::new(client, &demo_config)?;
    let mut steps = Vec::new();

    let email = session
        .names_changed("María", "Del Río")
        .await
        .ok_or_else(|| anyhow!("No email proposed"))?;
    session.confirm_email()?;
    steps.push(format!("Correo propuesto y confirmado: {}", email));

    let indicator = session
        .field_changed(FieldKey::TaxId, "abc123456xyz")
        .await?
        .ok_or_else(|| anyhow!("RFC verification superseded"))?;
    steps.push(indicator.message(FieldKey::TaxId));

    session.grant_tax_id_override()?;
    steps.push(session.indicator(FieldKey::TaxId).message(FieldKey::TaxId));

    session
        .field_changed(FieldKey::NationalId, "PEJJ800101HDFRRN09")
        .await?;
    session
        .field_changed(FieldKey::SocialSecurityNumber, "12345678901")
        .await?;

    let selection = session.select_area(3).await?;
    let role = selection.select_position(11)?;
    let form = FormData::new()
        .with("nombre", "María")
        .with("apellido", "Del Río")
        .with("fecha_alta", "2024-03-01")
        .with("sueldo", "15000");
    let mut documents = DocumentStager::from_config(&demo_config);
    documents.stage("INE", "ine.pdf", "application/pdf", b"%PDF-1.4".to_vec())?;

    let outcome = session.submit(&form, &role, &mut documents).await?;
    steps.push(format!("Envío: {:?}", outcome));
    steps.push(format!(
        "Formulario reiniciado, listo para enviar: {}",
        session.can_submit()
    ));

    print(
        format,
        json!({
            "session_id": session.session_id(),
            "steps": steps,
            "submissions": session.client().submissions().len(),
        }),
        steps.join("\n"),
    )
}

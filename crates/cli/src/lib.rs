use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use intake_api::EventClient;
use intake_gcp::{create_folder, GcpClients};
use intake_models::{CloudEvent, Config, CLOUDEVENTS_SPEC_VERSION, OBJECT_FINALIZED};
use intake_validation::{FileValidator, Verdict};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "intake-cli")]
#[command(about = "Operator tools for the discovery intake service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to configs/default.toml when present)
    #[arg(long, env = "INTAKE_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the upload integrity check against a local file
    Validate {
        /// File to check
        path: PathBuf,

        /// Object name to report (its extension picks the check)
        #[arg(long)]
        name: Option<String>,
    },

    /// Deliver a Cloud Storage event to a running function
    SendEvent {
        /// Function URL
        #[arg(long, default_value = "http://localhost:8080")]
        url: String,

        /// Bucket the object lives in
        #[arg(long)]
        bucket: String,

        /// Object name
        #[arg(long)]
        name: String,

        /// CloudEvent type
        #[arg(long = "type", default_value = OBJECT_FINALIZED)]
        event_type: String,

        /// Send in structured mode instead of binary mode
        #[arg(long)]
        structured: bool,
    },

    /// Create a folder placeholder so uploads have somewhere to go
    CreateFolder {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        folder: String,
    },

    /// Print the effective configuration
    ShowConfig,
}

/// A storage event like the ones Eventarc delivers.
pub fn storage_event(bucket: &str, name: &str, event_type: &str) -> CloudEvent {
    CloudEvent {
        id: uuid::Uuid::new_v4().to_string(),
        source: format!("//storage.googleapis.com/projects/_/buckets/{}", bucket),
        specversion: CLOUDEVENTS_SPEC_VERSION.to_string(),
        event_type: event_type.to_string(),
        subject: Some(format!("objects/{}", name)),
        time: Some(Utc::now()),
        datacontenttype: Some("application/json".to_string()),
        data: Some(json!({
            "kind": "storage#object",
            "bucket": bucket,
            "name": name,
        })),
    }
}

pub async fn validate_file(config: &Config, path: &Path, name: Option<&str>) -> Result<Verdict> {
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let validator = FileValidator::from_config(&config.validation);
    Ok(validator.validate(path, &name).await?)
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Validate { path, name } => {
            let verdict = validate_file(&config, &path, name.as_deref()).await?;
            let label = if verdict.valid { "VALID" } else { "INVALID" };
            println!("{} ({}): {}", label, verdict.kind, verdict.message);
            if !verdict.valid {
                bail!("{} failed validation", path.display());
            }
        }

        Commands::SendEvent {
            url,
            bucket,
            name,
            event_type,
            structured,
        } => {
            let event = storage_event(&bucket, &name, &event_type);
            let client = EventClient::new(url);
            let response = if structured {
                client.send_structured(&event).await?
            } else {
                client.send_binary(&event).await?
            };
            let status = response.status();
            let body = response.text().await?;
            println!("{} {}", status, body);
            if !status.is_success() {
                bail!("event {} was not accepted", event.id);
            }
        }

        Commands::CreateFolder { bucket, folder } => {
            let store = GcpClients::from_config(&config.gcp)?.storage(&config.gcp)?;
            let name = create_folder(&store, &bucket, &folder).await?;
            println!("Created gs://{}/{}", bucket, name);
        }

        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

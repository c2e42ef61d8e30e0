//! ProfileVault CLI
//!
//! Thin wrapper around profilevault-core. Every command is sent as a typed
//! request through the message router, the same way an embedding host
//! reaches the store.
//!
//! ## Usage
//!
//! ```bash
//! # Initialize storage (safe to repeat)
//! profilevault init
//!
//! # Create a profile
//! profilevault profile add "Work" --field email=me@work.example --field city=Berlin
//!
//! # List profiles (the active one is marked with *)
//! profilevault profile list
//!
//! # Patch some fields of a profile
//! profilevault profile update <profile_id> --field phone=+49301234
//!
//! # Select the active profile
//! profilevault profile activate <profile_id>
//!
//! # Show or change settings
//! profilevault settings show
//! profilevault settings set --threshold 0.8 --inline-button false
//!
//! # Backup and restore
//! profilevault export backup.json
//! profilevault import backup.json
//!
//! # Wipe everything
//! profilevault clear --yes
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use profilevault_core::service::{ProfileIdPayload, UpdateProfilePayload};
use profilevault_core::{
    service, transport, Ack, MessageType, ProfileCipher, ProfileFields, ProfileId, ProfileRecord,
    ProfileStore, RedbBackend, RouterClient, Settings, SettingsPatch, StorageSnapshot,
    VaultConfig,
};

/// Database file inside the data directory
const DB_FILE: &str = "profilevault.redb";

/// ProfileVault - encrypted autofill profiles
#[derive(Parser)]
#[command(name = "profilevault")]
#[command(version = "0.1.0")]
#[command(about = "ProfileVault - encrypted autofill profiles")]
#[command(
    long_about = "Local, encrypted store of form-filling profiles and settings, reached through a typed request/response router."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.profilevault/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Give up on a request after this many milliseconds
    #[arg(long, global = true, default_value_t = 30_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storage with first-run defaults
    Init,

    /// Profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Settings management
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Export all data to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Replace all data with the contents of a JSON export
    Import {
        /// Source file
        file: PathBuf,
    },

    /// Delete every profile and reset settings (IRREVERSIBLE)
    Clear {
        /// Confirm the wipe (required)
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List all profiles
    List,
    /// Show profile details
    Show {
        /// Profile ID
        profile_id: String,
    },
    /// Show the active profile
    Active,
    /// Create a new profile
    Add {
        /// Display name
        name: String,
        /// Field value as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Update fields of a profile
    Update {
        /// Profile ID
        profile_id: String,
        /// Field value as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,
    },
    /// Delete a profile
    Delete {
        /// Profile ID
        profile_id: String,
    },
    /// Make a profile the active one
    Activate {
        /// Profile ID
        profile_id: String,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show current settings
    Show,
    /// Change one or more settings
    Set {
        /// Enable or disable autofill
        #[arg(long)]
        enabled: Option<bool>,
        /// Show the inline fill button
        #[arg(long)]
        inline_button: Option<bool>,
        /// Detect forms automatically
        #[arg(long)]
        auto_detect: Option<bool>,
        /// Confidence threshold between 0 and 1
        #[arg(long)]
        threshold: Option<f64>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.profilevault/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".profilevault")
        .join("data")
}

/// Parse a `key=value` field argument
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn collect_fields(pairs: Vec<(String, String)>) -> ProfileFields {
    let mut fields = ProfileFields::new();
    for (key, value) in pairs {
        fields.set_key(&key, value);
    }
    fields
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn print_profile(profile: &ProfileRecord, active: bool) {
    println!(
        "Profile: {}{}",
        profile.name,
        if active { " [active]" } else { "" }
    );
    println!("  ID: {}", profile.id);
    println!("  Created: {}", format_timestamp(profile.created_at));
    println!("  Updated: {}", format_timestamp(profile.updated_at));
    if profile.data.is_empty() {
        println!("  Fields: (none)");
    } else {
        println!("  Fields:");
        for (key, value) in profile.data.iter() {
            println!("    {}: {}", key, value);
        }
    }
}

fn print_settings(settings: &Settings) {
    println!("Settings:");
    println!("  Enabled: {}", settings.enabled);
    println!("  Inline button: {}", settings.show_inline_button);
    println!("  Auto-detect forms: {}", settings.auto_detect_forms);
    println!("  Confidence threshold: {}", settings.confidence_threshold);
}

async fn active_profile(client: &RouterClient) -> Result<Option<ProfileRecord>> {
    Ok(client.send_empty(MessageType::GetProfile).await?)
}

async fn run_profile(client: &RouterClient, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            let profiles: Vec<ProfileRecord> = client.send_empty(MessageType::ListProfiles).await?;
            let active_id = active_profile(client).await?.map(|p| p.id);

            if profiles.is_empty() {
                println!("No profiles found.");
            } else {
                println!("Profiles ({}):", profiles.len());
                println!();
                for profile in profiles {
                    let marker = if Some(&profile.id) == active_id.as_ref() {
                        "*"
                    } else {
                        " "
                    };
                    println!("  {} {} {}", marker, profile.id, profile.name);
                }
            }
        }

        ProfileAction::Show { profile_id } => {
            let profiles: Vec<ProfileRecord> = client.send_empty(MessageType::ListProfiles).await?;
            let active_id = active_profile(client).await?.map(|p| p.id);

            match profiles.iter().find(|p| p.id.as_str() == profile_id) {
                Some(profile) => print_profile(profile, active_id.as_ref() == Some(&profile.id)),
                None => anyhow::bail!("Profile not found: {}", profile_id),
            }
        }

        ProfileAction::Active => match active_profile(client).await? {
            Some(profile) => print_profile(&profile, true),
            None => println!("No active profile."),
        },

        ProfileAction::Add { name, fields } => {
            let record = ProfileRecord::new(&name, collect_fields(fields));
            let _: Ack = client.send(MessageType::SaveProfile, &record).await?;
            println!("Created profile: {}", name);
            println!("  ID: {}", record.id);
        }

        ProfileAction::Update { profile_id, fields } => {
            let payload = UpdateProfilePayload {
                profile_id: Some(ProfileId::from(profile_id.as_str())),
                updates: collect_fields(fields),
            };
            let _: Ack = client.send(MessageType::UpdateProfile, &payload).await?;
            println!("Updated profile: {}", profile_id);
        }

        ProfileAction::Delete { profile_id } => {
            let payload = ProfileIdPayload {
                profile_id: Some(ProfileId::from(profile_id.as_str())),
            };
            let _: Ack = client.send(MessageType::DeleteProfile, &payload).await?;
            println!("Deleted profile: {}", profile_id);
        }

        ProfileAction::Activate { profile_id } => {
            let payload = ProfileIdPayload {
                profile_id: Some(ProfileId::from(profile_id.as_str())),
            };
            let _: Ack = client.send(MessageType::SetActiveProfile, &payload).await?;
            println!("Active profile: {}", profile_id);
        }
    }

    Ok(())
}

async fn run_settings(client: &RouterClient, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings: Settings = client.send_empty(MessageType::GetSettings).await?;
            print_settings(&settings);
        }

        SettingsAction::Set {
            enabled,
            inline_button,
            auto_detect,
            threshold,
        } => {
            let patch = SettingsPatch {
                enabled,
                show_inline_button: inline_button,
                auto_detect_forms: auto_detect,
                confidence_threshold: threshold,
            };
            if patch.is_empty() {
                anyhow::bail!(
                    "Nothing to update. Pass at least one of --enabled, --inline-button, --auto-detect, --threshold"
                );
            }

            let _: Ack = client.send(MessageType::UpdateSettings, &patch).await?;
            let settings: Settings = client.send_empty(MessageType::GetSettings).await?;
            println!("Settings updated.");
            print_settings(&settings);
        }
    }

    Ok(())
}

async fn run_export(client: &RouterClient, file: &Path) -> Result<()> {
    let snapshot: StorageSnapshot = client.send_empty(MessageType::ExportData).await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(file, json)
        .with_context(|| format!("Failed to write export to {}", file.display()))?;

    println!(
        "Exported {} profile(s) to {}",
        snapshot.profiles.len(),
        file.display()
    );
    Ok(())
}

async fn run_import(client: &RouterClient, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let _: Ack = client.send(MessageType::ImportData, &value).await?;
    let profiles: Vec<ProfileRecord> = client.send_empty(MessageType::ListProfiles).await?;
    println!(
        "Imported {} profile(s) from {}",
        profiles.len(),
        file.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config = VaultConfig::default().with_request_timeout(Duration::from_millis(cli.timeout_ms));

    let backend = RedbBackend::open(data_dir.join(DB_FILE))
        .with_context(|| format!("Failed to open storage in {}", data_dir.display()))?;
    let store = Arc::new(ProfileStore::with_config(
        backend,
        ProfileCipher::from_environment(),
        &config,
    ));

    let (client, inbound) = transport::channel_from_config(&config);
    let _router = service::serve(store, inbound).await?;

    match cli.command {
        Commands::Init => {
            let snapshot: StorageSnapshot = client.send_empty(MessageType::ExportData).await?;
            println!("ProfileVault v{}", snapshot.version);
            println!();
            println!("Data directory: {}", data_dir.display());
            println!("Profiles: {}", snapshot.profiles.len());
        }

        Commands::Profile { action } => run_profile(&client, action).await?,

        Commands::Settings { action } => run_settings(&client, action).await?,

        Commands::Export { file } => run_export(&client, &file).await?,

        Commands::Import { file } => run_import(&client, &file).await?,

        Commands::Clear { yes } => {
            if !yes {
                println!("WARNING: Clearing is IRREVERSIBLE!");
                println!();
                println!("This will:");
                println!("  - Delete every profile");
                println!("  - Reset settings to defaults");
                println!();
                println!("To confirm, run: profilevault clear --yes");
            } else {
                let _: Ack = client.send_empty(MessageType::ClearAll).await?;
                println!("All data cleared.");
            }
        }
    }

    Ok(())
}

//! PassVault CLI - Command line interface for a password vault.
//!
//! This tool creates a vault for an account, unlocks it with the master
//! password and manages its items. Items are encrypted before they leave
//! the process; the selected store only ever sees ciphertext.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use passvault_common::AccountId;
use passvault_storage::{create_default_registry, RemoteVaultStore};
use passvault_vault::{
    generate, ControllerConfig, GeneratorOptions, ItemDraft, UnlockStatus, VaultController,
    VaultItem,
};

#[derive(Parser)]
#[command(name = "passvault")]
#[command(about = "PassVault - Client-side encrypted password vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Account the vault belongs to.
    #[arg(short, long, global = true, default_value = "default")]
    account: String,

    /// Store backend: "local", "http" or "memory".
    #[arg(long, global = true, default_value = "local")]
    store: String,

    /// Directory for the local store.
    #[arg(long, global = true, default_value = "passvault-data")]
    root: PathBuf,

    /// Server URL for the http store.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session token for the http store (prompted for if omitted).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Controller configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Password length.
    #[arg(short, long, default_value_t = 16)]
    length: usize,

    /// Leave out lowercase letters.
    #[arg(long)]
    no_lower: bool,

    /// Leave out uppercase letters.
    #[arg(long)]
    no_upper: bool,

    /// Leave out digits.
    #[arg(long)]
    no_digits: bool,

    /// Include symbols.
    #[arg(long)]
    symbols: bool,

    /// Keep characters that look alike (Il1O0).
    #[arg(long)]
    allow_look_alikes: bool,
}

impl GenerateArgs {
    fn options(&self) -> GeneratorOptions {
        GeneratorOptions {
            length: self.length,
            lower: !self.no_lower,
            upper: !self.no_upper,
            digits: !self.no_digits,
            symbols: self.symbols,
            exclude_look_alikes: !self.allow_look_alikes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault for an account.
    Init,

    /// List items.
    List,

    /// Show a single item, including its password.
    Show {
        /// Item id.
        id: String,
    },

    /// Add an item.
    Add {
        /// Item title.
        #[arg(short, long)]
        title: String,

        /// Username or login.
        #[arg(short, long, default_value = "")]
        username: String,

        /// URL the credentials belong to.
        #[arg(long)]
        url: Option<String>,

        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,

        /// Generate the password instead of prompting for it.
        #[arg(short, long)]
        generate: bool,

        #[command(flatten)]
        generator: GenerateArgs,
    },

    /// Edit an item. Unset fields keep their current value.
    Edit {
        /// Item id.
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Prompt for a new password.
        #[arg(long)]
        password: bool,
    },

    /// Remove an item.
    Remove {
        /// Item id.
        id: String,
    },

    /// Generate a password without touching the vault.
    Generate {
        #[command(flatten)]
        generator: GenerateArgs,
    },

    /// Show vault information.
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(&cli.store).await,

        Commands::List => cmd_list(&cli.store).await,

        Commands::Show { id } => cmd_show(&cli.store, &id).await,

        Commands::Add {
            title,
            username,
            url,
            notes,
            generate: use_generator,
            generator,
        } => {
            let mut draft = ItemDraft::new(title, username, String::new());
            draft.url = url;
            draft.notes = notes;
            let generator = use_generator.then(|| generator.options());
            cmd_add(&cli.store, draft, generator).await
        }

        Commands::Edit {
            id,
            title,
            username,
            url,
            notes,
            password,
        } => {
            let changes = ItemChanges {
                title,
                username,
                url,
                notes,
                password,
            };
            cmd_edit(&cli.store, &id, changes).await
        }

        Commands::Remove { id } => cmd_remove(&cli.store, &id).await,

        Commands::Generate { generator } => cmd_generate(&generator.options()),

        Commands::Info => cmd_info(&cli.store).await,
    }
}

/// Field overrides for `edit`.
struct ItemChanges {
    title: Option<String>,
    username: Option<String>,
    url: Option<String>,
    notes: Option<String>,
    password: bool,
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Load controller settings, falling back to defaults.
fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ControllerConfig::from_json(&json).context("Invalid config file")
}

/// Resolve the selected store through the registry.
fn open_store(args: &StoreArgs) -> Result<Arc<dyn RemoteVaultStore>> {
    let config = match args.store.as_str() {
        "local" => serde_json::json!({ "root": args.root }),
        "http" => {
            let base_url = args
                .base_url
                .as_deref()
                .context("The http store needs --base-url")?;
            let token = match &args.token {
                Some(token) => Zeroizing::new(token.clone()),
                None => prompt_password("Session token: ")?,
            };
            serde_json::json!({ "base_url": base_url, "token": token.as_str() })
        }
        _ => serde_json::Value::Null,
    };

    let registry = create_default_registry();
    registry
        .resolve(&args.store, config)
        .with_context(|| format!("Failed to open {} store", args.store))
}

fn controller(args: &StoreArgs) -> Result<VaultController> {
    let account = AccountId::new(args.account.as_str()).context("Invalid account")?;
    let config = load_config(args.config.as_deref())?;
    let store = open_store(args)?;

    VaultController::new(account, store, config).context("Failed to create vault controller")
}

/// Prompt for the master password and unlock the vault.
async fn unlock(args: &StoreArgs) -> Result<VaultController> {
    let vault = controller(args)?;
    let password = prompt_password("Master password: ")?;

    let report = vault
        .unlock(password.as_bytes())
        .await
        .context("Failed to unlock vault")?;

    match report.status() {
        UnlockStatus::LikelyWrongPassword => {
            anyhow::bail!(
                "None of the {} items could be decrypted. Wrong password?",
                report.total
            );
        }
        UnlockStatus::Partial => {
            warn!(
                skipped = report.skipped(),
                total = report.total,
                "Some items could not be decrypted and are hidden"
            );
        }
        UnlockStatus::Unlocked | UnlockStatus::Empty => {}
    }

    Ok(vault)
}

fn find_item(vault: &VaultController, id: &str) -> Result<VaultItem> {
    vault
        .item(id)?
        .with_context(|| format!("No item with id {}", id))
}

/// Create the vault.
async fn cmd_init(args: &StoreArgs) -> Result<()> {
    info!("Creating vault for account: {}", args.account);

    let password = prompt_password("New master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;

    if *password != *confirm {
        anyhow::bail!("Passwords do not match");
    }

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let vault = controller(args)?;
    vault
        .bootstrap(password.as_bytes())
        .await
        .context("Failed to create vault")?;

    println!("Vault created successfully!");
    println!("  Account: {}", vault.account());
    if let Some(meta) = vault.meta() {
        println!("  Iterations: {}", meta.iterations);
    }

    Ok(())
}

/// List items.
async fn cmd_list(args: &StoreArgs) -> Result<()> {
    let vault = unlock(args).await?;
    let items = vault.items()?;

    if items.is_empty() {
        println!("Vault is empty.");
    } else {
        println!("{} items:", items.len());
        for item in &items {
            let url = item.url.as_deref().unwrap_or("");
            println!("  {}  {}  {}  {}", item.id, item.title, item.username, url);
        }
    }

    vault.lock();
    Ok(())
}

/// Show one item.
async fn cmd_show(args: &StoreArgs, id: &str) -> Result<()> {
    let vault = unlock(args).await?;
    let item = find_item(&vault, id)?;

    println!("Title:    {}", item.title);
    println!("Username: {}", item.username);
    println!("Password: {}", item.password);
    if let Some(url) = &item.url {
        println!("URL:      {}", url);
    }
    if let Some(notes) = &item.notes {
        println!("Notes:    {}", notes);
    }

    vault.lock();
    Ok(())
}

/// Add an item.
async fn cmd_add(
    args: &StoreArgs,
    mut draft: ItemDraft,
    generator: Option<GeneratorOptions>,
) -> Result<()> {
    draft.password = match generator {
        Some(options) => generate(&options).context("Failed to generate password")?,
        None => prompt_password("Item password: ")?.to_string(),
    };
    draft.validate().context("Invalid item")?;

    let vault = unlock(args).await?;
    let id = vault.add_item(draft).await.context("Failed to add item")?;

    println!("Item added: {}", id);

    vault.lock();
    Ok(())
}

/// Edit an item.
async fn cmd_edit(args: &StoreArgs, id: &str, changes: ItemChanges) -> Result<()> {
    let vault = unlock(args).await?;
    let item = find_item(&vault, id)?;

    let mut draft = ItemDraft::from(&item);
    if let Some(title) = changes.title {
        draft.title = title;
    }
    if let Some(username) = changes.username {
        draft.username = username;
    }
    if let Some(url) = changes.url {
        draft.url = Some(url).filter(|u| !u.is_empty());
    }
    if let Some(notes) = changes.notes {
        draft.notes = Some(notes).filter(|n| !n.is_empty());
    }
    if changes.password {
        draft.password = prompt_password("New item password: ")?.to_string();
    }

    let new_id = vault
        .update_item(id, draft)
        .await
        .context("Failed to update item")?;

    println!("Item updated: {} (new id {})", id, new_id);

    vault.lock();
    Ok(())
}

/// Remove an item.
async fn cmd_remove(args: &StoreArgs, id: &str) -> Result<()> {
    info!("Removing item: {}", id);

    let vault = unlock(args).await?;
    vault.delete_item(id).await.context("Failed to remove item")?;

    println!("Item removed: {}", id);

    vault.lock();
    Ok(())
}

/// Print a generated password.
fn cmd_generate(options: &GeneratorOptions) -> Result<()> {
    let password = Zeroizing::new(generate(options).context("Failed to generate password")?);
    println!("{}", *password);
    Ok(())
}

/// Show vault information.
async fn cmd_info(args: &StoreArgs) -> Result<()> {
    let vault = unlock(args).await?;

    println!("Vault Information:");
    println!("  Account: {}", vault.account());
    println!("  Store: {}", args.store);
    if let Some(meta) = vault.meta() {
        println!("  KDF: PBKDF2-HMAC-SHA256, {} iterations", meta.iterations);
    }
    if let Some(report) = vault.last_report() {
        println!("  Items: {}", report.total);
        println!("    Decrypted: {}", report.decrypted);
        println!("    Failed authentication: {}", report.skipped_auth);
        println!("    Malformed: {}", report.skipped_format);
    }

    vault.lock();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator_options(args: &[&str]) -> GeneratorOptions {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Generate { generator } => generator.options(),
            _ => panic!("expected the generate command"),
        }
    }

    #[test]
    fn test_generate_flags() {
        assert_eq!(
            generator_options(&["passvault", "generate"]),
            GeneratorOptions::default()
        );

        let options = generator_options(&[
            "passvault",
            "generate",
            "--symbols",
            "--allow-look-alikes",
            "-l",
            "24",
        ]);
        assert!(options.symbols);
        assert!(!options.exclude_look_alikes);
        assert_eq!(options.length, 24);
    }
}

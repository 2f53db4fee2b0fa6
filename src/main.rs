//! sshhop command-line interface.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use sshhop::config::{self, LOG_ENV};
use sshhop::{
    announce, launch, run_direct, run_subprocess, ChainCompiler, CompiledCommand,
    CredentialStore, LaunchPlan, Script, Session, StoreError,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Shortest master passphrase accepted when creating or changing a store.
const MIN_MASTER_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "sshhop")]
#[command(author, version, about = "Launch multi-hop SSH connections and scripted sessions", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Credential store file (default: $SSHHOP_STORE or the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect using an ordered list of commands and directives
    Connect(ConnectArgs),

    /// Manage the encrypted credential store
    #[command(subcommand)]
    Passwords(PasswordCommand),
}

#[derive(Args)]
struct ConnectArgs {
    /// Run the compiled command as a child instead of replacing this process
    #[arg(long)]
    subprocess: bool,

    /// Keep steps that precede a final SSH hop
    #[arg(long)]
    keep_pre_steps: bool,

    /// Print what would run and exit
    #[arg(long)]
    dry_run: bool,

    /// Commands, in order (e.g. "ssh bastion" "SEND:sudo -i" INTERACT)
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    commands: Vec<String>,
}

#[derive(Subcommand)]
enum PasswordCommand {
    /// Create a new, empty store
    Init,

    /// Add a credential
    Add {
        /// Credential ID, as used by SENDPASS:<id>
        id: String,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List stored credentials (secrets masked)
    List,

    /// Print one stored secret
    Show {
        /// Credential ID
        id: String,
    },

    /// Remove a credential
    Remove {
        /// Credential ID
        id: String,
    },

    /// Re-encrypt the store under a new master password
    ChangeMaster,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store_path = cli.store.unwrap_or_else(config::default_store_path);
    let result = match cli.command {
        Command::Connect(args) => connect(args, store_path).await,
        Command::Passwords(cmd) => passwords(cmd, store_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("sshhop=warn"),
        1 => EnvFilter::new("sshhop=info"),
        _ => EnvFilter::new("sshhop=debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn connect(args: ConnectArgs, store_path: PathBuf) -> Result<()> {
    let compiler = ChainCompiler::new().keep_pre_steps(args.keep_pre_steps);
    let plan = launch::plan(&args.commands, &compiler)?;

    if args.dry_run {
        println!("{plan}");
        return Ok(());
    }

    match plan {
        LaunchPlan::Direct(compiled) => run_compiled(&compiled, args.subprocess),
        LaunchPlan::Interactive(script) => run_interactive(&script, store_path).await,
    }
}

fn run_compiled(compiled: &CompiledCommand, subprocess: bool) -> Result<()> {
    let shell = config::login_shell();
    info!(command = %compiled.command, "running compiled command");

    if !subprocess {
        run_direct(&shell, compiled, &mut io::stdout())?;
        return Ok(());
    }

    announce(compiled, &mut io::stdout());
    run_subprocess(&shell, &compiled.command)?;
    Ok(())
}

async fn run_interactive(script: &Script, store_path: PathBuf) -> Result<()> {
    let mut builder = Session::builder();

    if script.needs_credentials() {
        let (store, _master) = unlock_store(store_path)?;
        debug!(entries = store.len(), "credential store unlocked");
        builder = builder.credentials(Arc::new(store));
    }

    let outcome = builder.spawn(script)?.run().await?;
    debug!(code = outcome.exit_code, "session ended");

    if let Some(reason) = outcome.automation_error {
        eprintln!("Automation stopped early: {reason}");
    }
    Ok(())
}

fn passwords(cmd: PasswordCommand, store_path: PathBuf) -> Result<()> {
    match cmd {
        PasswordCommand::Init => {
            let mut store = CredentialStore::new(&store_path);
            if store.exists() {
                return Err(StoreError::AlreadyExists(store_path).into());
            }
            let master = prompt_new_passphrase("Create master password")?;
            store.initialize(&master)?;
            println!("Credential store created at {}", store.path().display());
        }
        PasswordCommand::Add { id, description } => {
            let (mut store, master) = unlock_store(store_path)?;
            if store.get_entry(&id).is_ok() {
                return Err(StoreError::Duplicate(id).into());
            }
            let secret = prompt_confirmed(&format!("Password for '{id}'"))?;
            store.add(&id, &description, &secret)?;
            store.save(&master, None)?;
            println!("Credential '{id}' added");
        }
        PasswordCommand::List => {
            let (store, _master) = unlock_store(store_path)?;
            if store.is_empty() {
                println!("No credentials stored");
                return Ok(());
            }
            let width = store.list().iter().map(|e| e.id.len()).max().unwrap_or(2).max(2);
            let mut out = io::stdout().lock();
            writeln!(out, "{:<width$}  DESCRIPTION", "ID")?;
            for entry in store.list() {
                writeln!(out, "{:<width$}  {}", entry.id, entry.description)?;
            }
        }
        PasswordCommand::Show { id } => {
            let (store, _master) = unlock_store(store_path)?;
            println!("{}", store.get(&id)?);
        }
        PasswordCommand::Remove { id } => {
            let (mut store, master) = unlock_store(store_path)?;
            store.remove(&id)?;
            store.save(&master, None)?;
            println!("Credential '{id}' removed");
        }
        PasswordCommand::ChangeMaster => {
            let mut store = CredentialStore::new(&store_path);
            if !store.exists() {
                return Err(StoreError::NotInitialized(store_path).into());
            }
            let old = prompt_secret("Current master password: ")?;
            let new = prompt_new_passphrase("New master password")?;
            store.change_master_passphrase(&old, &new)?;
            println!("Master password changed");
        }
    }
    Ok(())
}

/// Open an existing store with a prompted master passphrase.
fn unlock_store(path: PathBuf) -> Result<(CredentialStore, Zeroizing<String>)> {
    let mut store = CredentialStore::new(&path);
    if !store.exists() {
        return Err(StoreError::NotInitialized(path).into());
    }
    let master = prompt_secret("Master password: ")?;
    store
        .load(&master)
        .with_context(|| format!("cannot unlock {}", store.path().display()))?;
    Ok((store, master))
}

fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let secret = rpassword::prompt_password(prompt).context("failed to read password")?;
    Ok(Zeroizing::new(secret))
}

fn prompt_confirmed(label: &str) -> Result<Zeroizing<String>> {
    let first = prompt_secret(&format!("{label}: "))?;
    let second = prompt_secret("Confirm: ")?;
    if *first != *second {
        bail!("passwords do not match");
    }
    Ok(first)
}

fn prompt_new_passphrase(label: &str) -> Result<Zeroizing<String>> {
    let passphrase = prompt_confirmed(label)?;
    if passphrase.chars().count() < MIN_MASTER_LEN {
        bail!("master password must be at least {MIN_MASTER_LEN} characters");
    }
    Ok(passphrase)
}

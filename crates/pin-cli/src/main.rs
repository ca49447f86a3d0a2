//! pin - command-line front end for the pin core library.
//!
//! Signs in against the configured Nhost project, keeps the user snapshot in
//! local storage, and manages the offline attribute/option database.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pin_core::auth::{AuthChangeEvent, AuthFacade, NhostClient, SignUpOptions};
use pin_core::cache::OptionsDb;
use pin_core::models::{AttributeOption, OptionValue};
use pin_core::routing::{RouteDecision, RouteGuard};
use pin_core::storage::FileStorage;
use pin_core::views::{self, AuthErrorState};
use pin_core::{Config, IdentityProvider};
use serde_json::Map;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: pin <command> [args]

Commands:
  signin <email>                 Sign in with email and password
  signup <email> [display name]  Create an account
  signout                        Sign out and clear the local snapshot
  whoami                         Show the cached user
  route <path>                   Show the guard decision for a path
  import-attributes <file>       Replace cached attributes from a JSON array
  import-options <file>          Replace cached options from a JSON array
  attributes                     Print cached attributes
  options                        Print cached options";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). When `PIN_LOG_DIR` is set,
/// logs are also written to a daily rolling file there.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("PIN_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pin.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

struct Session {
    auth: AuthFacade,
    events: broadcast::Receiver<AuthChangeEvent>,
    guard: RouteGuard,
}

impl Session {
    fn open(config: &Config) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(config.storage_dir()?));
        let provider = Arc::new(
            NhostClient::new(&config.nhost_subdomain, &config.nhost_region)?
                .with_storage(storage.clone()),
        );
        let events = provider.subscribe();

        let auth = AuthFacade::new(provider, storage);
        auth.init_auth_data();

        Ok(Self {
            auth,
            events,
            guard: config.route_guard(),
        })
    }

    /// Apply session events the provider published during the last call.
    fn sync(&mut self) {
        self.auth.drain_events(&mut self.events);
    }
}

fn open_db(config: &Config) -> Result<OptionsDb> {
    let mut db = OptionsDb::new(config.data_dir()?);
    db.initialize().context("Failed to open option database")?;
    Ok(db)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing <{}>\n\n{}", name, USAGE))
}

async fn sign_in(config: &Config, email: &str) -> Result<()> {
    let mut session = Session::open(config)?;
    let mut state = AuthErrorState::new();
    let password = prompt_password()?;

    state.set_loading(true);
    let response = session.auth.sign_in_with_email(email, &password).await;
    state.set_loading(false);
    session.sync();

    if let Some(ref error) = response.error {
        state.handle_error(error);
        anyhow::bail!("Sign-in failed: {}", state.error);
    }

    match views::user_data(&session.auth) {
        Some(user) => println!("Signed in as {}", user.email),
        None => println!("Signed in"),
    }
    Ok(())
}

async fn sign_up(config: &Config, email: &str, display_name: Option<&str>) -> Result<()> {
    let mut session = Session::open(config)?;
    let mut state = AuthErrorState::new();
    let password = prompt_password()?;

    let options = SignUpOptions {
        display_name: display_name.map(str::to_string),
        metadata: Some(Map::new()),
    };

    state.set_loading(true);
    let response = session
        .auth
        .sign_up_with_email(email, &password, options)
        .await;
    state.set_loading(false);
    session.sync();

    if let Some(ref error) = response.error {
        state.handle_error(error);
        anyhow::bail!("Sign-up failed: {}", state.error);
    }

    if response.session.is_some() {
        println!("Account created, signed in as {}", email);
    } else {
        println!("Account created. Check {} to verify the address.", email);
    }
    Ok(())
}

async fn sign_out(config: &Config) -> Result<()> {
    let mut session = Session::open(config)?;
    let response = session.auth.sign_out().await;
    session.sync();

    if let Some(error) = response.error {
        // The local session is gone either way
        eprintln!("Warning: server sign-out failed: {}", error);
    }
    println!("Signed out");
    Ok(())
}

fn whoami(config: &Config) -> Result<()> {
    let session = Session::open(config)?;
    let authenticated = session.auth.is_authenticated();

    match views::user_data(&session.auth) {
        Some(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            if !authenticated {
                println!("(session expired - sign in again to refresh)");
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

fn route(config: &Config, path: &str) -> Result<()> {
    let session = Session::open(config)?;
    match session.guard.check(path, &session.auth) {
        RouteDecision::Allow => println!("allow {}", path),
        RouteDecision::Redirect(target) => println!("redirect {} -> {}", path, target),
    }
    Ok(())
}

fn import_attributes(config: &Config, file: &Path) -> Result<()> {
    let attributes: Vec<AttributeOption> = read_json(file)?;
    let mut db = open_db(config)?;
    db.save_attributes(&attributes)?;
    println!("Saved {} attributes", attributes.len());
    Ok(())
}

fn import_options(config: &Config, file: &Path) -> Result<()> {
    let options: Vec<OptionValue> = read_json(file)?;
    let mut db = open_db(config)?;
    db.save_options(&options)?;
    println!("Saved {} options", options.len());
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load()?;
    debug!(command = %command, subdomain = %config.nhost_subdomain, "Starting");

    match command.as_str() {
        "signin" => sign_in(&config, required(&args, 2, "email")?).await,
        "signup" => {
            let email = required(&args, 2, "email")?;
            let display_name = (args.len() > 3).then(|| args[3..].join(" "));
            sign_up(&config, email, display_name.as_deref()).await
        }
        "signout" => sign_out(&config).await,
        "whoami" => whoami(&config),
        "route" => route(&config, required(&args, 2, "path")?),
        "import-attributes" => import_attributes(&config, Path::new(required(&args, 2, "file")?)),
        "import-options" => import_options(&config, Path::new(required(&args, 2, "file")?)),
        "attributes" => print_json(&open_db(&config)?.get_attributes()?),
        "options" => print_json(&open_db(&config)?.get_options()?),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            info!(command = other, "Unknown command");
            Err(anyhow::anyhow!("Unknown command '{}'\n\n{}", other, USAGE))
        }
    }
}

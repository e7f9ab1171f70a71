//! # KidBank Shell Library
//!
//! Wires the client to a storage backend and drives it from a line-based
//! command loop.
//!
//! ## Module Organization
//! ```text
//! kidbank_shell/
//! ├── lib.rs          ◄─── You are here (arguments, wiring, run loop)
//! ├── shell.rs        ◄─── Command parsing + screen printing
//! └── error.rs        ◄─── RunError
//! ```
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   --backend memory              --backend sqlite                        │
//! │   ────────────────              ────────────────                        │
//! │   MemoryGateway                 SqliteGateway(Database(kidbank.db))     │
//! │   gone on exit                  survives restarts                       │
//! │                                                                         │
//! │   Both: MemoryIdentity (accounts live for one run; a parent's id is    │
//! │         derived from the email, so signing up again with the same      │
//! │         email finds the same household in SQLite)                      │
//! │         FilePreferences (theme survives restarts)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod shell;

use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kidbank_client::memory::{MemoryGateway, MemoryIdentity};
use kidbank_client::theme::FilePreferences;
use kidbank_client::{App, AppContext, Backend, ClientConfig};
use kidbank_core::gateway::{Collection, Document, Gateway, Mutation, Query};
use kidbank_core::{Kid, Money, ParentProfile, User};
use kidbank_db::{Database, DbConfig, SqliteGateway};

pub use error::{RunError, RunResult};
use shell::{Command, Flow};

/// Account created by `--demo`.
pub const DEMO_EMAIL: &str = "parent@example.com";
pub const DEMO_PASSWORD: &str = "kidbank123";
const DEMO_KID: (&str, &str, &str) = ("Ava", "🦄", "2580");

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "kidbank", version, about = "EasyKidsBank household banking shell")]
pub struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, env = "KIDBANK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage backend: memory | sqlite
    #[arg(short, long)]
    pub backend: Option<Backend>,

    /// SQLite database file (used with --backend sqlite)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Pre-create a demo parent account and kid
    #[arg(long)]
    pub demo: bool,

    /// Address to open first
    #[arg(default_value = "")]
    pub address: String,
}

/// Initializes the tracing subscriber. Logs go to stderr so they never
/// interleave with screen output.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=kidbank_client=trace` - Trace the client only
/// - Default: INFO, DEBUG for the kidbank crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kidbank=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then environment, then command-line flags.
pub fn load_config(args: &Args) -> RunResult<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(db) = &args.db {
        config.storage.database_path = Some(db.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Opens the configured backend.
pub async fn open_gateway(config: &ClientConfig) -> RunResult<Rc<dyn Gateway>> {
    match config.storage.backend {
        Backend::Memory => {
            info!("Using in-memory storage");
            Ok(Rc::new(MemoryGateway::new()))
        }
        Backend::Sqlite => {
            let path = config.database_path();
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            info!(path = %path.display(), "Using SQLite storage");
            let db = Database::new(DbConfig::new(path)).await?;
            Ok(Rc::new(SqliteGateway::new(db)))
        }
    }
}

/// Creates the demo account and, if the household is empty, its profile and
/// one kid.
pub async fn seed_demo(identity: &MemoryIdentity, gateway: &dyn Gateway) -> RunResult<User> {
    let user = identity.add_account(DEMO_EMAIL, DEMO_PASSWORD, Some("Demo Parent"));

    if !gateway.fetch(&Query::kids_of(&user.id)).await?.is_empty() {
        debug!(user_id = %user.id, "Demo household already exists");
        return Ok(user);
    }

    let now = Utc::now();
    let mut batch = Vec::new();
    if gateway
        .get_document(Collection::Parents, &user.id)
        .await?
        .is_none()
    {
        batch.push(Mutation::Insert(Document::Parent(ParentProfile::for_user(&user, now))));
    }

    let (name, avatar, pin) = DEMO_KID;
    batch.push(Mutation::Insert(Document::Kid(Kid {
        id: Uuid::new_v4().to_string(),
        parent_id: user.id.clone(),
        name: name.to_string(),
        pin: pin.to_string(),
        balance: Money::from_cents(1000),
        theme: "default".to_string(),
        custom_themes: Vec::new(),
        avatar_emoji: avatar.to_string(),
        created_at: now,
        updated_at: now,
        last_login: None,
    })));

    gateway.mutate(batch).await?;
    info!(email = DEMO_EMAIL, kid = name, pin, "Demo household created");
    Ok(user)
}

/// Builds the app for `config`. Nothing is started yet.
pub async fn build_app(config: ClientConfig, demo: bool) -> RunResult<App> {
    let gateway = open_gateway(&config).await?;
    let identity = Rc::new(MemoryIdentity::new());
    if demo {
        seed_demo(&identity, gateway.as_ref()).await?;
    }
    let preferences = Rc::new(FilePreferences::new(config.preferences_path()));

    let ctx = AppContext::new(config, gateway, identity, preferences);
    Ok(App::new(ctx))
}

/// Runs the shell until `quit` or end of input. Must run inside a
/// `LocalSet`.
pub async fn run(args: Args) -> RunResult<()> {
    let config = load_config(&args)?;
    info!(backend = %config.storage.backend, "Starting EasyKidsBank");

    let app = build_app(config, args.demo).await?;
    app.start(&args.address).await;
    shell::settle().await;

    if args.demo {
        println!("Demo account: {DEMO_EMAIL} / {DEMO_PASSWORD}  (kid PIN {})", DEMO_KID.2);
    }
    println!("{}", shell::HELP);
    print!("{}", shell::render(&app));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if shell::execute(&app, command).await == Flow::Quit {
            break;
        }
    }

    app.shutdown();
    info!("Goodbye");
    Ok(())
}

//! The shell's wiring against a real SQLite file.

use std::path::Path;

use kidbank_client::memory::MemoryIdentity;
use kidbank_client::{App, Backend, ClientConfig};
use kidbank_core::gateway::Query;
use kidbank_core::Money;
use kidbank_shell::shell::{self, Command, Flow};
use kidbank_shell::{build_app, load_config, open_gateway, seed_demo, Args, DEMO_EMAIL, DEMO_PASSWORD};
use tempfile::TempDir;
use tokio::task::LocalSet;

fn sqlite_config(dir: &Path) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.storage.backend = Backend::Sqlite;
    config.storage.database_path = Some(dir.join("data").join("kidbank.db"));
    config.storage.preferences_path = Some(dir.join("preferences.toml"));
    config
}

/// Settles until `done` holds, giving SQLite a few rounds.
async fn until(done: impl Fn() -> bool) -> bool {
    for _ in 0..40 {
        if done() {
            return true;
        }
        shell::settle().await;
    }
    done()
}

async fn run(app: &App, line: &str) -> Flow {
    let command = Command::parse(line).unwrap();
    shell::execute(app, command).await
}

#[tokio::test]
async fn test_demo_household_on_sqlite() {
    let dir = TempDir::new().unwrap();
    LocalSet::new()
        .run_until(async {
            let app = build_app(sqlite_config(dir.path()), true).await.unwrap();
            app.start("").await;
            shell::settle().await;
            assert_eq!(app.output().address, "#landing");

            run(&app, "#parent-login").await;
            let sign_in = format!("sign-in email={DEMO_EMAIL} password={DEMO_PASSWORD}");
            assert_eq!(run(&app, &sign_in).await, Flow::Continue);

            let store = app.ctx().store.clone();
            assert!(until(|| store.kids().len() == 1).await);
            let kids = store.kids();
            assert_eq!(kids[0].name, "Ava");
            assert_eq!(kids[0].balance, Money::from_cents(1000));
            assert_eq!(app.output().address, "#parent-dashboard");

            assert_eq!(run(&app, "quit").await, Flow::Quit);
            app.shutdown();
        })
        .await;
}

#[tokio::test]
async fn test_demo_seed_runs_once_per_database() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(dir.path());

    for _ in 0..2 {
        let gateway = open_gateway(&config).await.unwrap();
        let user = seed_demo(&MemoryIdentity::new(), gateway.as_ref())
            .await
            .unwrap();
        let kids = gateway.fetch(&Query::kids_of(&user.id)).await.unwrap();
        assert_eq!(kids.len(), 1);
    }
}

#[test]
fn test_flags_override_the_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kidbank.toml");
    std::fs::write(
        &path,
        "[app]\nname = \"Family Bank\"\n\n[storage]\nbackend = \"memory\"\n",
    )
    .unwrap();

    let args = Args {
        config: Some(path),
        backend: Some(Backend::Sqlite),
        db: Some(dir.path().join("custom.db")),
        ..Args::default()
    };
    let config = load_config(&args).unwrap();
    assert_eq!(config.app.name, "Family Bank");
    assert_eq!(config.storage.backend, Backend::Sqlite);
    assert_eq!(config.database_path(), dir.path().join("custom.db"));
}

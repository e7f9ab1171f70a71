//! # Seed Data Generator
//!
//! Creates a demo household for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p kidbank-db --bin seed
//! cargo run -p kidbank-db --bin seed -- --db ./data/kidbank.db --email me@example.com
//! ```
//!
//! ## Generated Household
//! - One parent profile whose id matches the account the shell creates for
//!   the same email with `--demo`
//! - Three kids with starting balances
//! - A few weeks of transaction history per kid
//! - One pending deposit request

use chrono::{Duration, Utc};
use clap::Parser;
use kidbank_core::gateway::{Document, Gateway, Mutation};
use kidbank_core::identity::account_id;
use kidbank_core::{
    DepositRequest, Kid, Money, ParentProfile, RequestStatus, RequestedBy, Transaction,
    TransactionType,
};
use kidbank_db::{Database, DbConfig, SqliteGateway};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Kids in the demo household: name, avatar, PIN, theme.
const KIDS: &[(&str, &str, &str, &str)] = &[
    ("Ava", "🦄", "2580", "berry-pink"),
    ("Ben", "🦖", "1357", "forest-green"),
    ("Cleo", "🐼", "8642", "space-adventure"),
];

/// Weekly history: kind, cents, description.
const HISTORY: &[(TransactionType, i64, &str)] = &[
    (TransactionType::Deposit, 500, "Weekly allowance"),
    (TransactionType::Reward, 200, "Cleaned room"),
    (TransactionType::Withdrawal, 150, "Ice cream"),
    (TransactionType::Penalty, 100, "Late bedtime"),
];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Create a demo EasyKidsBank household")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./kidbank_dev.db")]
    db: String,

    /// Parent account email
    #[arg(short, long, default_value = "parent@example.com")]
    email: String,

    /// Weeks of history per kid
    #[arg(short, long, default_value_t = 4)]
    weeks: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args = Args::parse();

    println!("🌱 EasyKidsBank Seed Data Generator");
    println!("===================================");
    println!("Database: {}", args.db);
    println!("Parent:   {}", args.email);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.kids().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} kids", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let gateway = SqliteGateway::new(db);
    let batch = household(&args.email, args.weeks);
    let documents = batch.len();
    gateway.mutate(batch).await?;
    info!(documents, "Seed batch committed");

    println!();
    println!("✓ Created {} kids and {} documents", KIDS.len(), documents);
    for (name, avatar, pin, _) in KIDS {
        println!("  {avatar} {name:<5} PIN {pin}");
    }
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// One atomic batch inserting the whole household.
fn household(email: &str, weeks: i64) -> Vec<Mutation> {
    let now = Utc::now();
    let parent_id = account_id(email);
    let start = now - Duration::weeks(weeks);

    let mut batch = vec![Mutation::Insert(Document::Parent(ParentProfile {
        id: parent_id.clone(),
        email: email.trim().to_lowercase(),
        display_name: "Demo Parent".to_string(),
        created_at: start,
        updated_at: start,
    }))];

    for (index, (name, avatar, pin, theme)) in KIDS.iter().enumerate() {
        let kid_id = Uuid::new_v4().to_string();
        let created_at = start + Duration::minutes(index as i64);
        let mut balance = Money::zero();
        let mut history = Vec::new();

        for week in 0..weeks {
            for (step, (kind, cents, description)) in HISTORY.iter().enumerate() {
                let amount = Money::from_cents(*cents);
                if kind.is_credit() {
                    balance += amount;
                } else {
                    balance -= amount;
                }
                history.push(Mutation::Insert(Document::Transaction(Transaction {
                    id: Uuid::new_v4().to_string(),
                    kid_id: kid_id.clone(),
                    parent_id: parent_id.clone(),
                    kind: *kind,
                    amount,
                    description: (*description).to_string(),
                    requested_by: RequestedBy::Parent,
                    processed_by: Some(parent_id.clone()),
                    created_at: created_at + Duration::weeks(week) + Duration::days(step as i64),
                })));
            }
        }

        batch.push(Mutation::Insert(Document::Kid(Kid {
            id: kid_id.clone(),
            parent_id: parent_id.clone(),
            name: (*name).to_string(),
            pin: (*pin).to_string(),
            balance,
            theme: (*theme).to_string(),
            custom_themes: Vec::new(),
            avatar_emoji: (*avatar).to_string(),
            created_at,
            updated_at: now,
            last_login: None,
        })));
        batch.extend(history);

        if index == 0 {
            batch.push(Mutation::Insert(Document::DepositRequest(DepositRequest {
                id: Uuid::new_v4().to_string(),
                kid_id,
                kid_name: (*name).to_string(),
                kid_avatar: (*avatar).to_string(),
                parent_id: parent_id.clone(),
                amount: Money::from_cents(1000),
                description: "Birthday money from Grandma".to_string(),
                status: RequestStatus::Pending,
                parent_note: None,
                created_at: now - Duration::hours(2),
                processed_at: None,
            })));
        }
    }

    batch
}

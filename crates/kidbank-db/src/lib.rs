//! # kidbank-db: SQLite Gateway Backend
//!
//! A local implementation of the gateway contract, so the client can run
//! without a hosted document store.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        KidBank Data Flow                                │
//! │                                                                         │
//! │  BankService.add_money()                                                │
//! │       │  mutate([IncrementBalance, Insert(tx)])                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   kidbank-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │ SqliteGateway │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │ (gateway.rs)  │───►│ ParentRepo    │    │  (embedded)  │    │    │
//! │  │   │ live queries  │    │ KidRepo       │    │ 001_init.sql │    │    │
//! │  │   │ batches       │    │ LedgerRepo    │    │              │    │    │
//! │  │   └───────┬───────┘    │ RequestRepo   │    └──────────────┘    │    │
//! │  │           │            └───────────────┘                        │    │
//! │  │           ▼                                                     │    │
//! │  │   Database (pool.rs): SqlitePool                                │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kidbank.db (WAL)                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per collection
//! - [`gateway`] - [`SqliteGateway`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kidbank_db::{Database, DbConfig, SqliteGateway};
//!
//! let db = Database::new(DbConfig::new("kidbank.db")).await?;
//! let gateway: Rc<dyn Gateway> = Rc::new(SqliteGateway::new(db));
//! ```

pub mod error;
pub mod gateway;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use gateway::SqliteGateway;
pub use pool::{Database, DbConfig};

pub use repository::{KidRepository, LedgerRepository, ParentRepository, RequestRepository};

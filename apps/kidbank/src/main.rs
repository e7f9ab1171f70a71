//! # KidBank Shell Entry Point
//!
//! ## Application Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EasyKidsBank Shell                               │
//! │                                                                         │
//! │  stdin ──► shell.rs ──► Router / UiEvent ──► mounted screen             │
//! │                                                 │                       │
//! │  stdout ◄── title, lines, actions, toasts ◄─────┘                       │
//! │                                                                         │
//! │  stderr ◄── tracing                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration (file, environment, flags)
//! 3. Open the storage backend (SQLite runs migrations)
//! 4. Restore the saved theme, subscribe to auth, wait for the first event
//! 5. Mount the screen for the starting address
//! 6. Read commands until `quit`
//!
//! The client is single-threaded, so everything runs on a current-thread
//! runtime inside a `LocalSet`.

use clap::Parser;
use kidbank_shell::Args;
use tokio::task::LocalSet;
use tracing::error;

fn main() -> std::process::ExitCode {
    kidbank_shell::init_tracing();
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let local = LocalSet::new();
    match local.block_on(&runtime, kidbank_shell::run(args)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("kidbank: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

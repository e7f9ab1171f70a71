//! # Command Loop
//!
//! Turns typed lines into router calls and UI events, then prints whatever
//! the mounted screen shows.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  #kid-login/abc123            external address change                   │
//! │  go manage-kids               push navigation                           │
//! │  replace kid-login abc123     replace navigation                        │
//! │  back                         one history entry back                    │
//! │  sign-in email=a@b.c password=secret                                    │
//! │  request amount=5 description="Birthday money"                          │
//! │  state                        print the store                           │
//! │  help                                                                   │
//! │  quit                                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that isn't a built-in command is an action name fired at the
//! mounted screen. Field values can be double-quoted to keep spaces.

use std::fmt::Write as _;
use std::time::Duration;

use kidbank_client::{App, NavOptions, Route, UiEvent};

pub const HELP: &str = "Commands: #route/params | go <route> [params] | replace <route> [params] | \
                        back | <action> [field=value ..] | state | help | quit";

/// Time given to spawned work (auth, gateway writes, live snapshots) before
/// the screen is printed.
const SETTLE_TIME: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Address(String),
    Go { route: Route, params: Vec<String> },
    Replace { route: Route, params: Vec<String> },
    Back,
    Action(UiEvent),
    State,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl Command {
    /// Parses one input line.
    ///
    /// ## Errors
    /// A message for the user: unknown route, unbalanced quote, a field
    /// without `=`.
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        if line.starts_with('#') {
            return Ok(Command::Address(line.to_string()));
        }

        let mut words = split_words(line)?.into_iter();
        let Some(head) = words.next() else {
            return Ok(Command::Empty);
        };

        match head.as_str() {
            "go" | "replace" => {
                let name = words
                    .next()
                    .ok_or_else(|| format!("Usage: {head} <route> [params..]"))?;
                let route: Route = name.parse()?;
                let params = words.collect();
                Ok(if head == "go" {
                    Command::Go { route, params }
                } else {
                    Command::Replace { route, params }
                })
            }
            "back" => Ok(Command::Back),
            "state" => Ok(Command::State),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit-shell" | ":q" => Ok(Command::Quit),
            action => {
                let mut event = UiEvent::new(action);
                for word in words {
                    let (field, value) = word
                        .split_once('=')
                        .ok_or_else(|| format!("Expected field=value, got '{word}'"))?;
                    event = event.with(field, value);
                }
                Ok(Command::Action(event))
            }
        }
    }
}

/// Splits on whitespace; `"..."` keeps spaces and drops the quotes.
fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }

    if quoted {
        return Err("Unbalanced quote".to_string());
    }
    if started {
        words.push(current);
    }
    Ok(words)
}

/// Lets spawned tasks on the `LocalSet` run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(SETTLE_TIME).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Runs `command`, waits for the work it started and prints the result.
pub async fn execute(app: &App, command: Command) -> Flow {
    let router = app.router();
    match command {
        Command::Empty => {}
        Command::Quit => return Flow::Quit,
        Command::Help => {
            println!("{HELP}");
            return Flow::Continue;
        }
        Command::State => {
            print!("{}", describe_state(app));
            return Flow::Continue;
        }
        Command::Address(token) => router.handle_address(&token),
        Command::Go { route, params } => {
            router.navigate(route, NavOptions::push().with_params(params))
        }
        Command::Replace { route, params } => {
            router.navigate(route, NavOptions::replace().with_params(params))
        }
        Command::Back => {
            if !router.back() {
                println!("(start of history)");
            }
        }
        Command::Action(event) => {
            if !app.dispatch(&event) {
                println!("No action '{}' on this screen", event.action);
            }
        }
    }

    settle().await;
    print!("{}", render(app));
    Flow::Continue
}

/// Title, container lines, bound actions and queued toasts.
pub fn render(app: &App) -> String {
    let screen = app.output();
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "=== {} ({})", screen.title, screen.address);
    for line in &screen.lines {
        let _ = writeln!(out, "  {line}");
    }
    if !screen.actions.is_empty() {
        let _ = writeln!(out, "actions: {}", screen.actions.join(", "));
    }
    for toast in app.drain_toasts() {
        let _ = writeln!(out, "{toast}");
    }
    out
}

fn describe_state(app: &App) -> String {
    app.ctx().store.read(|state| {
        let mut out = String::new();
        let user = state
            .user
            .as_ref()
            .map(|u| format!("{} <{}>", u.display_name, u.email))
            .unwrap_or_else(|| "-".to_string());
        let kid = state
            .current_kid
            .as_ref()
            .map(|k| format!("{} ({})", k.name, k.balance))
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(out, "user:             {user}");
        let _ = writeln!(out, "authenticated:    {}", state.is_authenticated);
        let _ = writeln!(out, "kid mode:         {}", state.is_kid_mode);
        let _ = writeln!(out, "current kid:      {kid}");
        let _ = writeln!(out, "kids:             {}", state.kids.len());
        let _ = writeln!(out, "transactions:     {}", state.transactions.len());
        let _ = writeln!(out, "pending requests: {}", state.pending_requests.len());
        let _ = writeln!(out, "theme:            {}", state.current_theme);
        let _ = writeln!(out, "view:             {}", state.current_view);
        let _ = writeln!(out, "initialized:      {}", state.is_initialized);
        if let Some(error) = &state.error {
            let _ = writeln!(out, "error:            {error}");
        }
        out
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_an_address_change() {
        assert_eq!(
            Command::parse("  #kid-login/abc ").unwrap(),
            Command::Address("#kid-login/abc".into())
        );
    }

    #[test]
    fn test_go_and_replace() {
        assert_eq!(
            Command::parse("go manage-kids").unwrap(),
            Command::Go {
                route: Route::ManageKids,
                params: vec![]
            }
        );
        assert_eq!(
            Command::parse("replace kid-login k1").unwrap(),
            Command::Replace {
                route: Route::KidLogin,
                params: vec!["k1".into()]
            }
        );
    }

    #[test]
    fn test_unknown_route_is_rejected() {
        let err = Command::parse("go nowhere").unwrap_err();
        assert!(err.contains("nowhere"));
        assert!(Command::parse("go").is_err());
    }

    #[test]
    fn test_action_with_quoted_fields() {
        let command =
            Command::parse(r#"request amount=5 description="Birthday money""#).unwrap();
        let Command::Action(event) = command else {
            panic!("expected an action");
        };
        assert_eq!(event.action, "request");
        assert_eq!(event.text("amount"), "5");
        assert_eq!(event.text("description"), "Birthday money");
    }

    #[test]
    fn test_empty_quoted_value_is_kept() {
        let Command::Action(event) = Command::parse(r#"deny requestId=r1 note="""#).unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(event.field("note"), Some(""));
    }

    #[test]
    fn test_bad_input() {
        assert!(Command::parse("sign-in email").is_err());
        assert!(Command::parse(r#"request description="open"#).is_err());
        assert_eq!(Command::parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_builtins() {
        assert_eq!(Command::parse("back").unwrap(), Command::Back);
        assert_eq!(Command::parse("state").unwrap(), Command::State);
        assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
    }
}

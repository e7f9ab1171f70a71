//! # Parent Dashboard
//!
//! Household overview and the everyday money actions.
//!
//! ## Actions
//! ```text
//! add-kid       name= avatar= pin= balance=
//! add-money     kidId= amount= description= type=deposit|reward
//! remove-money  kidId= amount= description= type=penalty|withdrawal
//! theme         theme=
//! kid-mode      kidId=          → #kid-login/<kidId>
//! manage | requests | sign-out
//! ```

use kidbank_core::validation::{validate_amount, MAX_AMOUNT, MIN_AMOUNT};
use kidbank_core::{Money, NewKid, TransactionType};
use std::str::FromStr;

use super::run;
use crate::router::{NavOptions, Route};
use crate::store::{AppState, StateKey};
use crate::theme::{ThemeCategory, THEMES};
use crate::view::{widgets, Frame, Render, Screen, Ui, UiEvent};

pub struct ParentDashboard;

fn transaction_type(event: &UiEvent, fallback: TransactionType) -> Result<TransactionType, String> {
    match event.field("type").filter(|t| !t.is_empty()) {
        Some(kind) => TransactionType::from_str(kind),
        None => Ok(fallback),
    }
}

fn amount(event: &UiEvent, ui: &Ui<ParentDashboard>) -> Option<Money> {
    match validate_amount(event.text("amount"), MIN_AMOUNT, MAX_AMOUNT) {
        Ok(amount) => Some(amount),
        Err(err) => {
            ui.notifier().error(err.to_string());
            None
        }
    }
}

fn add_kid(event: &UiEvent, ui: &Ui<ParentDashboard>) {
    let balance = event.text("balance");
    let initial_balance = if balance.trim().is_empty() {
        Money::zero()
    } else {
        match validate_amount(balance, Money::zero(), MAX_AMOUNT) {
            Ok(amount) => amount,
            Err(err) => {
                ui.notifier().error(err.to_string());
                return;
            }
        }
    };
    let new_kid = NewKid {
        name: event.text("name").to_string(),
        pin: event.text("pin").to_string(),
        avatar_emoji: event.text("avatar").to_string(),
        initial_balance,
    };
    run(ui, |ui| async move {
        let id = ui.ctx().bank.create_kid(new_kid).await?;
        let name = ui.store().kid(&id).map(|kid| kid.name).unwrap_or_default();
        ui.notifier().success(format!("{name}'s account created!"));
        Ok(())
    });
}

fn move_money(event: &UiEvent, ui: &Ui<ParentDashboard>, credit: bool) {
    let kid_id = event.text("kidId").to_string();
    let Some(kid) = ui.store().kid(&kid_id) else {
        ui.notifier().error("Kid not found");
        return;
    };
    let Some(amount) = amount(event, ui) else {
        return;
    };
    let fallback = if credit {
        TransactionType::Deposit
    } else {
        TransactionType::Penalty
    };
    let kind = match transaction_type(event, fallback) {
        Ok(kind) if kind.is_credit() == credit => kind,
        Ok(kind) => {
            ui.notifier().error(format!("{} is not allowed here", kind.label()));
            return;
        }
        Err(err) => {
            ui.notifier().error(err);
            return;
        }
    };
    if !credit && amount > kid.balance {
        ui.notifier().error("Amount exceeds current balance");
        return;
    }

    let description = event.text("description").to_string();
    run(ui, move |ui| async move {
        let bank = &ui.ctx().bank;
        if credit {
            bank.add_money(&kid.id, amount, &description, kind).await?;
            ui.notifier()
                .success(format!("Added {amount} to {}'s account!", kid.name));
        } else {
            bank.remove_money(&kid.id, amount, &description, kind).await?;
            ui.notifier()
                .success(format!("Removed {amount} from {}'s account", kid.name));
        }
        Ok(())
    });
}

impl Screen for ParentDashboard {
    const NAME: &'static str = "parent-dashboard";

    fn watches() -> &'static [StateKey] {
        &[StateKey::User, StateKey::Kids, StateKey::PendingRequests, StateKey::CurrentTheme]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        let Some(user) = state.user.as_ref() else {
            return Render::Redirect(Route::Landing);
        };

        frame.line(format!("👋 Hi, {}!", user.display_name));
        let pending = state.pending_requests.len();
        if pending > 0 {
            let noun = if pending == 1 { "request" } else { "requests" };
            frame.line(format!("🔔 {pending} pending {noun}  [requests]"));
        }
        frame.blank();

        if state.kids.is_empty() {
            frame
                .line("👶 No kids yet")
                .line("Add your first child to get started!");
        } else {
            let total = state
                .kids
                .iter()
                .fold(Money::zero(), |sum, kid| sum + kid.balance);
            frame.line(widgets::balance("Family total", total));
            frame.lines(state.kids.iter().map(widgets::kid_row));
        }

        frame.blank().line("Themes:");
        for category in ThemeCategory::ALL {
            let names: Vec<String> = THEMES
                .iter()
                .filter(|theme| theme.category == category)
                .map(|theme| {
                    let mark = if theme.id == state.current_theme { "✓" } else { "" };
                    format!("{}{mark}", theme.id)
                })
                .collect();
            if !names.is_empty() {
                frame.line(format!("  {}: {}", category, names.join(", ")));
            }
        }
        frame
            .blank()
            .line("[add-kid] [add-money] [remove-money] [theme] [kid-mode] [manage] [requests] [sign-out]");

        frame.on("add-kid", |_, event, ui| add_kid(event, ui));
        frame.on("add-money", |_, event, ui| move_money(event, ui, true));
        frame.on("remove-money", |_, event, ui| move_money(event, ui, false));
        frame.on("theme", |_, event, ui| {
            let theme = event.text("theme");
            if ui.ctx().themes.resolve(theme).is_some() {
                ui.ctx().themes.apply(theme);
                ui.notifier().success("Theme applied!");
            } else {
                ui.notifier().error("Unknown theme");
            }
        });
        frame.on("kid-mode", |_, event, ui| {
            let options = match event.field("kidId").filter(|id| !id.is_empty()) {
                Some(kid_id) => NavOptions::push().with_param(kid_id),
                None => NavOptions::push(),
            };
            ui.navigate_with(Route::KidLogin, options);
        });
        frame.on("manage", |_, _, ui| ui.navigate(Route::ManageKids));
        frame.on("requests", |_, _, ui| ui.navigate(Route::PendingRequests));
        frame.on("sign-out", |_, _, ui| {
            run(ui, |ui| async move {
                ui.ctx().session.sign_out().await?;
                ui.notifier().info("Signed out");
                ui.navigate(Route::Landing);
                Ok(())
            });
        });
        Render::Done
    }
}

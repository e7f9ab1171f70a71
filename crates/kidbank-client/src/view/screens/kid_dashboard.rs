use chrono::Utc;
use kidbank_core::validation::{validate_amount, MAX_AMOUNT, MIN_AMOUNT};

use super::run;
use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::view::{widgets, Frame, Render, Screen};

/// Transactions shown on the dashboard.
const RECENT_LIMIT: usize = 10;

pub struct KidDashboard;

impl Screen for KidDashboard {
    const NAME: &'static str = "kid-dashboard";

    fn watches() -> &'static [StateKey] {
        &[StateKey::CurrentKid, StateKey::Transactions]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        let Some(kid) = state.current_kid.as_ref() else {
            return Render::Redirect(Route::Landing);
        };

        frame
            .line(format!("{} Hi, {}!", kid.avatar_emoji, kid.name))
            .line(widgets::balance("My Balance", kid.balance))
            .blank()
            .line("Recent Activity")
            .lines(widgets::transaction_list(&state.transactions, RECENT_LIMIT, Utc::now()))
            .blank()
            .line("[request amount= description=]  [profile]  [exit]");

        frame.on("request", |_, event, ui| {
            let amount = match validate_amount(event.text("amount"), MIN_AMOUNT, MAX_AMOUNT) {
                Ok(amount) => amount,
                Err(err) => {
                    ui.notifier().error(err.to_string());
                    return;
                }
            };
            let description = event.text("description").to_string();
            run(ui, move |ui| async move {
                ui.ctx()
                    .bank
                    .create_deposit_request(amount, &description)
                    .await?;
                ui.notifier()
                    .success("Request sent! Your parent will review it.");
                Ok(())
            });
        });
        frame.on("profile", |_, _, ui| ui.navigate(Route::KidProfile));
        frame.on("exit", |_, _, ui| {
            ui.ctx().session.exit_kid_mode();
            ui.navigate(Route::ParentDashboard);
        });
        Render::Done
    }
}

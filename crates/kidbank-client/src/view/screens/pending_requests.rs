use chrono::Utc;

use super::run;
use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::view::{widgets, Frame, Render, Screen};

pub struct PendingRequests;

impl Screen for PendingRequests {
    const NAME: &'static str = "pending-requests";

    fn watches() -> &'static [StateKey] {
        &[StateKey::PendingRequests]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        frame.line("Pending Requests").blank();
        if state.pending_requests.is_empty() {
            frame.line("✅ All caught up!").line("No pending requests");
        } else {
            let now = Utc::now();
            frame.lines(
                state
                    .pending_requests
                    .iter()
                    .map(|request| widgets::request_row(request, now)),
            );
        }
        frame
            .blank()
            .line("[approve requestId= note=]  [deny requestId= note=]  [back]");

        frame.on("approve", |_, event, ui| {
            let request_id = event.text("requestId").to_string();
            let note = event.text("note").to_string();
            let request = ui
                .store()
                .read(|state| state.pending_requests.iter().find(|r| r.id == request_id).cloned());
            run(ui, move |ui| async move {
                ui.ctx().bank.approve_request(&request_id, &note).await?;
                let message = match request {
                    Some(r) => format!("Approved! Added {} to {}'s account", r.amount, r.kid_name),
                    None => "Approved!".to_string(),
                };
                ui.notifier().success(message);
                Ok(())
            });
        });
        frame.on("deny", |_, event, ui| {
            let request_id = event.text("requestId").to_string();
            let note = event.text("note").to_string();
            run(ui, move |ui| async move {
                ui.ctx().bank.deny_request(&request_id, &note).await?;
                ui.notifier().info("Request denied");
                Ok(())
            });
        });
        frame.on("back", |_, _, ui| ui.navigate(Route::ParentDashboard));
        Render::Done
    }
}

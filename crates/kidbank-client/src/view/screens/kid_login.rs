//! Kid picker and PIN pad.
//!
//! `#kid-login/<kidId>` preselects a kid. When the kids have not arrived
//! yet the screen waits for them instead of showing an empty picker.

use kidbank_core::validation::PIN_LENGTH;
use tracing::debug;

use crate::error::ViewError;
use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::view::{widgets, Frame, Mount, Render, Screen, Ui};

#[derive(Debug, Default)]
pub struct KidLogin {
    selected: Option<String>,
    pin: String,
}

impl KidLogin {
    fn press(&mut self, digit: &str, ui: &Ui<Self>) {
        let Some(kid_id) = self.selected.clone() else {
            return;
        };
        if digit.len() != 1 || !digit.chars().all(|c| c.is_ascii_digit()) {
            return;
        }
        if self.pin.len() >= PIN_LENGTH {
            return;
        }
        self.pin.push_str(digit);
        if self.pin.len() < PIN_LENGTH {
            return;
        }

        let ctx = ui.ctx();
        if !ctx.session.verify_kid_pin(&kid_id, &self.pin) {
            debug!(kid_id = %kid_id, "Wrong PIN");
            ctx.notifier.error("Wrong PIN. Try again!");
            self.pin.clear();
            return;
        }

        let Some(kid) = ctx.store.kid(&kid_id) else {
            self.pin.clear();
            return;
        };
        ctx.notifier.success(format!("Welcome, {}!", kid.name));
        let task_ui = ui.clone();
        ui.spawn(async move {
            match task_ui.ctx().session.enter_kid_mode(kid).await {
                Ok(()) => task_ui.navigate(Route::KidDashboard),
                Err(err) => task_ui.notifier().error(err.message),
            }
        });
    }
}

impl Screen for KidLogin {
    const NAME: &'static str = "kid-login";

    fn watches() -> &'static [StateKey] {
        &[StateKey::Kids]
    }

    fn prepare(&mut self, state: &AppState, params: &[String]) -> Result<Mount, ViewError> {
        let Some(kid_id) = params.first() else {
            return Ok(Mount::Ready);
        };
        if state.kids.is_empty() {
            return Ok(Mount::WaitFor {
                key: StateKey::Kids,
                placeholder: "Loading...".to_string(),
            });
        }
        if state.kids.iter().any(|kid| &kid.id == kid_id) {
            self.selected = Some(kid_id.clone());
        }
        Ok(Mount::Ready)
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        frame.on("back", |_, _, ui| ui.navigate(Route::Landing));

        let selected = self
            .selected
            .as_deref()
            .and_then(|id| state.kids.iter().find(|kid| kid.id == id));

        let Some(kid) = selected else {
            if state.kids.is_empty() {
                frame
                    .line("👶 No kids available")
                    .line("Ask a parent to create your account first!")
                    .line("[back]");
                return Render::Done;
            }
            frame.line("Who's banking today?").blank();
            for kid in &state.kids {
                frame.line(format!("{} {}  [select kidId={}]", kid.avatar_emoji, kid.name, kid.id));
            }
            frame.line("[back]");
            frame.on("select", |screen, event, ui| {
                let kid_id = event.text("kidId");
                if ui.store().kid(kid_id).is_some() {
                    screen.selected = Some(kid_id.to_string());
                    screen.pin.clear();
                } else {
                    ui.notifier().error("Kid not found");
                }
            });
            return Render::Done;
        };

        frame
            .line(format!("{} Hi, {}!", kid.avatar_emoji, kid.name))
            .line("Enter your PIN")
            .line(widgets::pin_dots(self.pin.len(), PIN_LENGTH))
            .blank()
            .line("[digit digit=0-9]  [backspace]  [clear]  [change-kid]  [back]");

        frame.on("digit", |screen, event, ui| screen.press(event.text("digit"), ui));
        frame.on("backspace", |screen, _, _| {
            screen.pin.pop();
        });
        frame.on("clear", |screen, _, _| screen.pin.clear());
        frame.on("change-kid", |screen, _, _| {
            screen.selected = None;
            screen.pin.clear();
        });
        Render::Done
    }
}

use kidbank_core::KidPatch;

use super::run;
use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::view::{Frame, Render, Screen, UiEvent};

pub struct ManageKids;

/// Patch from the non-empty edit fields.
fn patch_from(event: &UiEvent) -> KidPatch {
    let field = |name: &str| {
        event
            .field(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    KidPatch {
        name: field("name"),
        pin: field("pin"),
        avatar_emoji: field("avatar"),
        ..KidPatch::default()
    }
}

impl Screen for ManageKids {
    const NAME: &'static str = "manage-kids";

    fn watches() -> &'static [StateKey] {
        &[StateKey::Kids]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        frame.line("Manage Kids").blank();
        if state.kids.is_empty() {
            frame.line("👶 No kids yet");
        }
        for kid in &state.kids {
            frame.line(format!(
                "{} {}  PIN ••••  theme {}  [{}]",
                kid.avatar_emoji, kid.name, kid.theme, kid.id
            ));
        }
        frame
            .blank()
            .line("[edit kidId= name= avatar= pin=]  [delete kidId=]  [back]");

        frame.on("edit", |_, event, ui| {
            let kid_id = event.text("kidId").to_string();
            if ui.store().kid(&kid_id).is_none() {
                ui.notifier().error("Kid not found");
                return;
            }
            let patch = patch_from(event);
            if patch.is_empty() {
                ui.notifier().info("Nothing to save");
                return;
            }
            run(ui, move |ui| async move {
                ui.ctx().bank.update_kid(&kid_id, patch).await?;
                ui.notifier().success("Changes saved!");
                Ok(())
            });
        });
        frame.on("delete", |_, event, ui| {
            let Some(kid) = ui.store().kid(event.text("kidId")) else {
                ui.notifier().error("Kid not found");
                return;
            };
            run(ui, move |ui| async move {
                ui.ctx().bank.delete_kid(&kid.id).await?;
                ui.notifier().success(format!("{}'s account deleted", kid.name));
                Ok(())
            });
        });
        frame.on("back", |_, _, ui| ui.navigate(Route::ParentDashboard));
        Render::Done
    }
}

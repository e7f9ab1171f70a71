use kidbank_core::Kid;

use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::theme::{ThemeCategory, THEMES};
use crate::view::{widgets, Frame, Render, Screen, Ui};

pub struct KidProfile;

fn choose_theme(kid: Kid, theme_id: String, ui: &Ui<KidProfile>) {
    let themes = &ui.ctx().themes;
    if themes.resolve(&theme_id).is_none() {
        ui.notifier().error("Unknown theme");
        return;
    }
    themes.apply_temporary(&theme_id);

    let task_ui = ui.clone();
    ui.spawn(async move {
        match task_ui.ctx().bank.save_kid_theme(&kid.id, &theme_id).await {
            Ok(()) => task_ui.notifier().success("Theme saved!"),
            Err(err) => {
                tracing::warn!(kid_id = %kid.id, error = %err, "Theme not saved");
                task_ui.ctx().themes.apply_temporary(&kid.theme);
                task_ui.notifier().error("Could not save theme");
            }
        }
    });
}

impl Screen for KidProfile {
    const NAME: &'static str = "kid-profile";

    fn watches() -> &'static [StateKey] {
        &[StateKey::CurrentKid]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        let Some(kid) = state.current_kid.as_ref() else {
            return Render::Redirect(Route::Landing);
        };

        let palette = frame.ui().ctx().themes.palette();
        frame
            .line(format!("{} {}", kid.avatar_emoji, kid.name))
            .line(widgets::balance("Balance", kid.balance))
            .line(widgets::palette_line(&palette))
            .blank()
            .line("Pick a theme:");

        let mark = |id: &str| if id == kid.theme { " ✓" } else { "" };
        for category in ThemeCategory::ALL {
            frame.line(format!("  {category}"));
            for theme in THEMES.iter().filter(|theme| theme.category == category) {
                frame.line(format!("    {} ({}){}", theme.name, theme.id, mark(theme.id)));
            }
        }
        if !kid.custom_themes.is_empty() {
            frame.line("  My Themes");
            for theme in &kid.custom_themes {
                frame.line(format!("    {} ({}){}", theme.name, theme.id, mark(&theme.id)));
            }
        }
        frame
            .blank()
            .line("[theme theme=]  [create-theme]  [back]");

        frame.on("theme", |_, event, ui| {
            let Some(kid) = ui.store().current_kid() else {
                return;
            };
            choose_theme(kid, event.text("theme").to_string(), ui);
        });
        frame.on("create-theme", |_, _, ui| ui.navigate(Route::ThemeCreator));
        frame.on("back", |_, _, ui| ui.navigate(Route::KidDashboard));
        Render::Done
    }
}

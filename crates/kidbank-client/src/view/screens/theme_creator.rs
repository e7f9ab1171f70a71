//! Custom theme designer with live preview.

use kidbank_core::validation::validate_color;
use kidbank_core::ThemeColors;
use std::str::FromStr;

use super::run;
use crate::router::Route;
use crate::store::AppState;
use crate::theme::{contrast_color, darken, lighten, ColorSlot};
use crate::view::{Frame, Render, Screen};

/// Name used when the kid leaves the field empty.
const DEFAULT_NAME: &str = "My Custom Theme";

/// The colours a kid can pick; the rest come from the default palette.
const EDITABLE: [(ColorSlot, &str); 4] = [
    (ColorSlot::Primary, "Main Color"),
    (ColorSlot::Secondary, "Second Color"),
    (ColorSlot::Background, "Background"),
    (ColorSlot::Accent, "Accent"),
];

#[derive(Debug, Default)]
pub struct ThemeCreator {
    name: String,
    colors: ThemeColors,
}

impl Screen for ThemeCreator {
    const NAME: &'static str = "theme-creator";

    fn render(&self, _state: &AppState, frame: &mut Frame<Self>) -> Render {
        let name: &str = if self.name.is_empty() {
            DEFAULT_NAME
        } else {
            &self.name
        };
        frame.line("🎨 Create Theme").blank().line(format!("Name: {name}"));
        for (slot, label) in EDITABLE {
            frame.line(format!("  {label:<13} {}", slot.get(&self.colors)));
        }
        let primary = &self.colors.primary;
        frame
            .blank()
            .line(format!(
                "Preview: {} / light {} / dark {} / text {}",
                primary,
                lighten(primary, 20.0),
                darken(primary, 15.0),
                contrast_color(primary)
            ))
            .blank()
            .line("[name name=]  [color slot=primary|secondary|background|accent value=#rrggbb]  [save]  [cancel]");

        frame.on("name", |screen, event, _| {
            screen.name = event.text("name").trim().to_string();
        });
        frame.on("color", |screen, event, ui| {
            let slot = match ColorSlot::from_str(event.text("slot")) {
                Ok(slot) if EDITABLE.iter().any(|(s, _)| *s == slot) => slot,
                _ => {
                    ui.notifier().error("Pick primary, secondary, background or accent");
                    return;
                }
            };
            match validate_color(event.text("value")) {
                Ok(value) => {
                    slot.set(&mut screen.colors, value);
                    ui.ctx().themes.apply_custom(&screen.colors);
                }
                Err(err) => ui.notifier().error(err.to_string()),
            }
        });
        frame.on("save", |screen, event, ui| {
            if let Some(name) = event.field("name") {
                screen.name = name.trim().to_string();
            }
            let Some(kid) = ui.store().current_kid() else {
                ui.notifier().error("Not logged in");
                return;
            };
            let name: &str = if screen.name.is_empty() {
                DEFAULT_NAME
            } else {
                &screen.name
            };
            let theme = match ui.ctx().themes.create_custom_theme(name, &screen.colors) {
                Ok(theme) => theme,
                Err(err) => {
                    ui.notifier().error(err.to_string());
                    return;
                }
            };
            run(ui, move |ui| async move {
                let ctx = ui.ctx();
                let theme_id = theme.id.clone();
                ctx.bank.save_custom_theme(&kid.id, theme).await?;
                ctx.bank.save_kid_theme(&kid.id, &theme_id).await?;
                ctx.themes.apply_temporary(&theme_id);
                ctx.notifier.success("Theme saved!");
                ui.navigate(Route::KidProfile);
                Ok(())
            });
        });
        frame.on("cancel", |_, _, ui| {
            let themes = &ui.ctx().themes;
            themes.apply_temporary(&themes.current_theme());
            ui.navigate(Route::KidProfile);
        });
        Render::Done
    }
}

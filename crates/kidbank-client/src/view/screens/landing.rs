use crate::router::Route;
use crate::store::{AppState, StateKey};
use crate::view::{Frame, Render, Screen};

pub struct Landing;

impl Screen for Landing {
    const NAME: &'static str = "landing";

    fn watches() -> &'static [StateKey] {
        &[StateKey::IsAuthenticated]
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        frame
            .line("🏦 EasyKidsBank")
            .line("Save, earn and watch your money grow!")
            .blank()
            .line("[parent-login]  I'm a Parent")
            .line("[kid-login]     I'm a Kid");
        if state.is_authenticated {
            frame.line("[dashboard]     Back to my dashboard");
            frame.on("dashboard", |_, _, ui| ui.navigate(Route::ParentDashboard));
        }

        frame.on("parent-login", |_, _, ui| ui.navigate(Route::ParentLogin));
        frame.on("kid-login", |_, _, ui| {
            if ui.store().is_authenticated() {
                ui.navigate(Route::KidLogin);
            } else {
                ui.notifier().info("Please have a parent log in first!");
                ui.navigate(Route::ParentLogin);
            }
        });
        Render::Done
    }
}

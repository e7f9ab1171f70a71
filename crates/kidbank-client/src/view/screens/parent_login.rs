//! Parent sign-in, sign-up and password reset.

use std::fmt;

use super::run;
use crate::error::ViewError;
use crate::router::{NavOptions, Route};
use crate::store::{AppState, StateKey};
use crate::view::{Frame, Mount, Render, Screen};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginMode {
    #[default]
    SignIn,
    SignUp,
    Reset,
}

impl LoginMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "sign-in" => Some(LoginMode::SignIn),
            "sign-up" => Some(LoginMode::SignUp),
            "reset" => Some(LoginMode::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for LoginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoginMode::SignIn => "Sign In",
            LoginMode::SignUp => "Create Account",
            LoginMode::Reset => "Reset Password",
        })
    }
}

#[derive(Debug, Default)]
pub struct ParentLogin {
    mode: LoginMode,
}

impl Screen for ParentLogin {
    const NAME: &'static str = "parent-login";

    fn watches() -> &'static [StateKey] {
        &[StateKey::IsLoading]
    }

    fn prepare(&mut self, state: &AppState, _params: &[String]) -> Result<Mount, ViewError> {
        if state.is_authenticated {
            return Ok(Mount::Redirect(Route::ParentDashboard));
        }
        Ok(Mount::Ready)
    }

    fn render(&self, state: &AppState, frame: &mut Frame<Self>) -> Render {
        frame.line(format!("👨‍👩‍👧 Parent Login: {}", self.mode)).blank();
        if state.is_loading {
            frame.line("Please wait...");
        }

        match self.mode {
            LoginMode::SignIn => {
                frame
                    .line("[sign-in email= password=]")
                    .line("[mode mode=sign-up]  Don't have an account? Sign up")
                    .line("[mode mode=reset]    Forgot password?");
                frame.on("sign-in", |_, event, ui| {
                    let email = event.text("email").to_string();
                    let password = event.text("password").to_string();
                    run(ui, |ui| async move {
                        ui.ctx().session.sign_in(&email, &password).await?;
                        ui.notifier().success("Welcome back!");
                        ui.navigate(Route::ParentDashboard);
                        Ok(())
                    });
                });
            }
            LoginMode::SignUp => {
                frame
                    .line("[sign-up displayName= email= password= confirm=]")
                    .line("[mode mode=sign-in]  Already have an account? Sign in");
                frame.on("sign-up", |_, event, ui| {
                    let email = event.text("email").to_string();
                    let password = event.text("password").to_string();
                    let confirm = event.text("confirm").to_string();
                    let display_name = event.text("displayName").to_string();
                    run(ui, |ui| async move {
                        ui.ctx()
                            .session
                            .sign_up(&email, &password, &confirm, &display_name)
                            .await?;
                        ui.notifier().success("Account created successfully!");
                        ui.navigate(Route::ParentDashboard);
                        Ok(())
                    });
                });
            }
            LoginMode::Reset => {
                frame
                    .line("[reset email=]")
                    .line("[mode mode=sign-in]  Back to sign in");
                frame.on("reset", |_, event, ui| {
                    let email = event.text("email").to_string();
                    run(ui, |ui| async move {
                        ui.ctx().session.reset_password(&email).await?;
                        ui.notifier()
                            .success("Password reset email sent! Check your inbox.");
                        ui.update(|screen, _| screen.mode = LoginMode::SignIn);
                        Ok(())
                    });
                });
            }
        }

        frame.line("[back]  Back");
        frame.on("mode", |screen, event, ui| match LoginMode::parse(event.text("mode")) {
            Some(mode) => screen.mode = mode,
            None => ui.notifier().error("Unknown form"),
        });
        frame.on("back", |_, _, ui| {
            ui.navigate_with(Route::Landing, NavOptions::push());
        });
        Render::Done
    }
}

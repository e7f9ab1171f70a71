//! # Screens
//!
//! One module per route. [`registry`] is the only place a route is turned
//! into a view; the `match` is exhaustive, so a route without a screen does
//! not compile.

mod kid_dashboard;
mod kid_login;
mod kid_profile;
mod landing;
mod manage_kids;
mod parent_dashboard;
mod parent_login;
mod pending_requests;
mod theme_creator;

pub use kid_dashboard::KidDashboard;
pub use kid_login::KidLogin;
pub use kid_profile::KidProfile;
pub use landing::Landing;
pub use manage_kids::ManageKids;
pub use parent_dashboard::ParentDashboard;
pub use parent_login::{LoginMode, ParentLogin};
pub use pending_requests::PendingRequests;
pub use theme_creator::ThemeCreator;

use std::future::Future;

use crate::app::AppContext;
use crate::error::ClientResult;
use crate::router::{Route, ViewRegistry};
use crate::view::{Screen, ScreenView, Ui};

/// The standard route-to-screen table.
pub fn registry(ctx: AppContext) -> ViewRegistry {
    ViewRegistry::new(move |route, router| match route {
        Route::Landing => ScreenView::boxed(&ctx, router, Landing),
        Route::ParentLogin => ScreenView::boxed(&ctx, router, ParentLogin::default()),
        Route::KidLogin => ScreenView::boxed(&ctx, router, KidLogin::default()),
        Route::ParentDashboard => ScreenView::boxed(&ctx, router, ParentDashboard),
        Route::KidDashboard => ScreenView::boxed(&ctx, router, KidDashboard),
        Route::ManageKids => ScreenView::boxed(&ctx, router, ManageKids),
        Route::PendingRequests => ScreenView::boxed(&ctx, router, PendingRequests),
        Route::KidProfile => ScreenView::boxed(&ctx, router, KidProfile),
        Route::ThemeCreator => ScreenView::boxed(&ctx, router, ThemeCreator::default()),
    })
}

/// Runs a service call on the local task set; an error becomes a toast.
fn run<S, F, Fut>(ui: &Ui<S>, work: F)
where
    S: Screen,
    F: FnOnce(Ui<S>) -> Fut,
    Fut: Future<Output = ClientResult<()>> + 'static,
{
    let notifier = ui.notifier().clone();
    let task = work(ui.clone());
    ui.spawn(async move {
        if let Err(err) = task.await {
            notifier.error(err.message);
        }
    });
}

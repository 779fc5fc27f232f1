//! Example handlers served by the action server.
//!
//! Handlers are registered under the `src/backend` namespace, so a router
//! configured with that base directory resolves `HomeController@index` to
//! [`HomeController`] and `Home/HomeController@index` to
//! [`home::HomeController`].

use actionkit::register_controller;

mod error;
mod greeting_controller;
pub mod home;
mod home_controller;
mod home_model;

pub use greeting_controller::GreetingController;
pub use home_controller::HomeController;
pub use home_model::HomeModel;

/// Base directory the handlers below are registered under.
pub const NAMESPACE: &str = "src/backend";

register_controller!(HomeController, "src/backend/HomeController");
register_controller!(home::HomeController, "src/backend/Home/HomeController");
register_controller!(GreetingController, "src/backend/GreetingController");

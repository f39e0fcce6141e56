//! UI layer: view lifecycle and console output.

pub mod console;
pub mod formatter;
pub mod view_controller;

pub use console::{ConsoleBoardRenderer, ConsoleListener};
pub use formatter::BoardFormatter;
pub use view_controller::{ViewActivationController, ViewStats};

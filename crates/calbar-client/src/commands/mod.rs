//! Commands run from the SwiftBar menu.

pub mod login;

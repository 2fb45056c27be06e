#[path = "helpers/mod.rs"]
mod helpers;

#[path = "lr/mod.rs"]
mod lr;

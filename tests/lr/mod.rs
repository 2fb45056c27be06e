//! Integration tests for the LR runtime, run against the statement grammar
//! in `helpers::grammar`.

mod tests_config;
mod tests_context;
mod tests_incremental;
mod tests_parse;
mod tests_properties;
mod tests_recovery;

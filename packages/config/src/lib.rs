// ABOUTME: Shared configuration names and defaults for evald
// ABOUTME: Every package reads environment variables through these constants

pub mod constants;
pub mod defaults;

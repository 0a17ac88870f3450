//! `pingsyncd` subcommands

pub mod run;
pub mod serve;

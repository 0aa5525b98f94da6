//! ecmctl subcommands.

pub mod restriction;

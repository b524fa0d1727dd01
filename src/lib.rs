#![allow(clippy::enum_variant_names)]

pub mod application;
pub mod cli;
pub mod description;
pub mod filesystem;
pub mod outline;

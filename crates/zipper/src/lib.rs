//! Command line front end for the `zipper_archive` engine.

pub mod commands;

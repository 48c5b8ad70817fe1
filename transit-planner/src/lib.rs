//! Transit journey planner.
//!
//! Builds a time-expanded graph of a public transport network and answers
//! journey queries over it: "leaving here after this time (or arriving
//! there by this time), which vehicles do I take?"

pub mod cache;
pub mod cost_index;
pub mod domain;
pub mod filter;
pub mod graph;
pub mod planner;
pub mod walkable;

#[cfg(test)]
mod testing;

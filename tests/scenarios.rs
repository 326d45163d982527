//! Entry point pulling in the nested scenario-family test files. Cargo
//! only auto-discovers `.rs` files directly under `tests/`; files in
//! subdirectories need an explicit `#[path]` module to be compiled.

#[path = "scenarios/signal_generation.rs"]
mod signal_generation;

#[path = "scenarios/position_lifecycle.rs"]
mod position_lifecycle;

#[path = "scenarios/capital_conservation.rs"]
mod capital_conservation;

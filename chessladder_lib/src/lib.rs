pub mod board;
pub mod channel;
pub mod error;
pub mod evaluator;
pub mod hint;
pub mod level;
pub mod messages;
pub mod orchestrator;
pub mod process;
pub mod rules;
pub mod session;

#[cfg(test)]
mod testing;

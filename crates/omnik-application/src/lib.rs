pub mod turn;

pub use turn::{TurnDefaults, TurnOrchestrator, TurnOutcome, TurnRequest};

pub mod cancellation;
pub mod renderer;

pub use cancellation::{CancellationCoordinator, Registration};
pub use renderer::{FlushPolicy, OutputRenderer, TurnState};

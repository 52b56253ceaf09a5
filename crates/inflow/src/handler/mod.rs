pub mod context;
pub mod hooks;
pub mod params;
pub mod runner;

pub use context::{CancelToken, Disposition, HandlerContext, Phase, PhaseFailure, ScratchDir};
pub use hooks::{HookResult, Hooks, PhaseHook};
pub use params::HandlerParams;
pub use runner::{HandlerOutcome, HandlerRunner, Sinks};

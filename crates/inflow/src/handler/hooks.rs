use crate::error::HookError;

use super::context::HandlerContext;

pub type HookResult = Result<(), HookError>;

/// A handler-supplied phase hook. Hooks get mutable access to the context
/// and typically assign publish types, destinations or extra metadata on
/// the file collection.
pub trait PhaseHook: Send + Sync {
    fn run(&self, ctx: &mut HandlerContext) -> HookResult;
}

impl<F> PhaseHook for F
where
    F: Fn(&mut HandlerContext) -> HookResult + Send + Sync,
{
    fn run(&self, ctx: &mut HandlerContext) -> HookResult {
        self(ctx)
    }
}

/// The three optional hook slots. Capability objects supplied at handler
/// construction; an empty slot is a no-op phase.
#[derive(Default)]
pub struct Hooks {
    pub preprocess: Option<Box<dyn PhaseHook>>,
    pub process: Option<Box<dyn PhaseHook>>,
    pub postprocess: Option<Box<dyn PhaseHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preprocess(mut self, hook: impl PhaseHook + 'static) -> Self {
        self.preprocess = Some(Box::new(hook));
        self
    }

    pub fn with_process(mut self, hook: impl PhaseHook + 'static) -> Self {
        self.process = Some(Box::new(hook));
        self
    }

    pub fn with_postprocess(mut self, hook: impl PhaseHook + 'static) -> Self {
        self.postprocess = Some(Box::new(hook));
        self
    }
}

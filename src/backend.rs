//! Pluggable shaping backends.
//!
//! [`OtShaper`] runs the built-in pipeline. [`BytecodeShaper`] hands the
//! buffer to a shaping program executed by an [`ExecutionEngine`], keeping
//! one execution context per face between calls.

use std::sync::OnceLock;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::font::Font;
use crate::plan::ShapePlan;

/// Errors reported by shaping backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The face carries no shaping program.
    #[error("face has no shaping module")]
    NoModule,
    /// The runtime or an execution context could not be created.
    #[error("failed to instantiate shaping module: {0}")]
    Instantiate(String),
    /// The shaping program failed.
    #[error("shaping module failed: {0}")]
    Execute(String),
    /// Every attempt failed.
    #[error("shaping failed after {attempts} attempts")]
    RetriesExhausted {
        /// How many times shaping was attempted.
        attempts: u32,
    },
}

/// Something that can shape a buffer.
pub trait Shaper {
    /// Shapes `buffer` with `plan`'s properties and features.
    fn shape(&self, plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) -> Result<(), BackendError>;
}

/// The built-in shaping pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtShaper;

impl Shaper for OtShaper {
    fn shape(&self, plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) -> Result<(), BackendError> {
        if crate::shape::shape_buffer(plan, font, buffer) {
            Ok(())
        } else {
            Err(BackendError::Execute("buffer was not shaped".to_string()))
        }
    }
}

/// Limits of one execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BytecodeConfig {
    /// Stack size in bytes.
    pub stack_size: u32,
    /// Heap size in bytes.
    pub heap_size: u32,
}

impl Default for BytecodeConfig {
    fn default() -> Self {
        BytecodeConfig {
            stack_size: 32 * 1024,
            heap_size: 2 * 1024 * 1024,
        }
    }
}

/// A virtual machine able to run shaping programs.
pub trait ExecutionEngine: Send + Sync {
    /// State shared by every program.
    type Runtime: Send + Sync;
    /// A loaded program ready to run.
    type Context: Send;

    /// Creates the shared state. Called once per [`BytecodeRuntime`].
    fn init(&self) -> Result<Self::Runtime, BackendError>;

    /// Loads a program.
    fn instantiate(
        &self,
        runtime: &Self::Runtime,
        module: &[u8],
        config: &BytecodeConfig,
    ) -> Result<Self::Context, BackendError>;

    /// Runs the program's shaping entry point.
    ///
    /// `Ok(false)` reports a failure the program itself signalled.
    fn shape(
        &self,
        context: &mut Self::Context,
        plan: &ShapePlan,
        font: &dyn Font,
        buffer: &mut Buffer,
    ) -> Result<bool, BackendError>;
}

/// An engine together with its lazily created runtime.
///
/// Meant to be created once per process and shared by all faces.
pub struct BytecodeRuntime<E: ExecutionEngine> {
    engine: E,
    runtime: OnceLock<E::Runtime>,
}

impl<E: ExecutionEngine> BytecodeRuntime<E> {
    /// Wraps an engine. The runtime is created on first use.
    pub fn new(engine: E) -> Self {
        BytecodeRuntime {
            engine,
            runtime: OnceLock::new(),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn runtime(&self) -> Result<&E::Runtime, BackendError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }

        // Racing initializations are harmless; the first one to land is kept.
        let runtime = self.engine.init()?;
        let _ = self.runtime.set(runtime);
        trace!("bytecode runtime initialized");
        self.runtime
            .get()
            .ok_or_else(|| BackendError::Instantiate("runtime was not stored".to_string()))
    }
}

/// Shapes with a program carried by a face.
///
/// The execution context is expensive to create, so one is cached per
/// shaper. Concurrent calls take the cached context or create their own;
/// only a context that shaped successfully is put back.
pub struct BytecodeShaper<'r, E: ExecutionEngine> {
    runtime: &'r BytecodeRuntime<E>,
    module: Option<Vec<u8>>,
    config: BytecodeConfig,
    context: Mutex<Option<E::Context>>,
}

impl<'r, E: ExecutionEngine> BytecodeShaper<'r, E> {
    /// A failing call is retried this many times with a fresh context.
    pub const MAX_RETRIES: u32 = 1;

    /// Creates a shaper for a face's program, if it has one.
    pub fn new(runtime: &'r BytecodeRuntime<E>, module: Option<Vec<u8>>, config: BytecodeConfig) -> Self {
        BytecodeShaper {
            runtime,
            module,
            config,
            context: Mutex::new(None),
        }
    }

    /// Whether a context is cached.
    pub fn has_cached_context(&self) -> bool {
        self.context.lock().is_some()
    }

    fn acquire(&self) -> Result<E::Context, BackendError> {
        if let Some(context) = self.context.lock().take() {
            return Ok(context);
        }

        let module = self.module.as_deref().ok_or(BackendError::NoModule)?;
        let runtime = self.runtime.runtime()?;
        debug!("creating a bytecode context");
        self.runtime.engine.instantiate(runtime, module, &self.config)
    }

    fn release(&self, context: E::Context, cache: bool) {
        if cache {
            let mut slot = self.context.lock();
            if slot.is_none() {
                *slot = Some(context);
                return;
            }
        }

        trace!("dropping a bytecode context");
    }
}

impl<E: ExecutionEngine> Shaper for BytecodeShaper<'_, E> {
    fn shape(&self, plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) -> Result<(), BackendError> {
        if !buffer.successful {
            return Err(BackendError::Execute("buffer is in error".to_string()));
        }

        for attempt in 0..=Self::MAX_RETRIES {
            let mut context = self.acquire()?;
            let error = match self.runtime.engine.shape(&mut context, plan, font, buffer) {
                Ok(true) => {
                    self.release(context, true);
                    return Ok(());
                }
                Ok(false) => BackendError::Execute("shape returned false".to_string()),
                Err(e) => e,
            };

            debug!("bytecode shaping attempt {} failed: {}", attempt + 1, error);
            buffer.successful = true;
            self.release(context, false);
        }

        Err(BackendError::RetriesExhausted {
            attempts: Self::MAX_RETRIES + 1,
        })
    }
}

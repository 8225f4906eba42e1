use std::error::Error;


pub type TaskError = Box<dyn Error + Send + Sync>;

pub type TaskResult = Result<(), TaskError>;

/// A unit of work the pool runs exactly once.
///
/// The pool takes ownership on submission and drops the task after
/// `execute` returns. A returned error or a panic is confined to this one
/// invocation; the worker keeps going.
pub trait Task: Send + 'static {
    fn execute(self: Box<Self>) -> TaskResult;
}

pub type BoxedTask = Box<dyn Task>;

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    #[inline]
    fn execute(self: Box<Self>) -> TaskResult {
        (*self)();
        Ok(())
    }
}

/// Adapts a closure returning `Result` into a [`Task`].
///
/// Plain closures can only fail by panicking; wrap them in this to report
/// failures as values instead.
pub struct FallibleTask<F>(pub F);

impl<F, E> Task for FallibleTask<F>
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: Into<TaskError>,
{
    #[inline]
    fn execute(self: Box<Self>) -> TaskResult {
        (self.0)().map_err(Into::into)
    }
}

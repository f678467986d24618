use std::future::Future;
use tokio::sync::OnceCell;

/// Request-scoped lazy value. The first caller runs the initializer; every
/// concurrent or later caller waits for and shares that single outcome,
/// including a failure.
///
/// If the task driving the initializer is dropped before it finishes, the
/// next caller starts a fresh attempt.
#[derive(Debug)]
pub struct SingleFlight<T, E> {
    cell: OnceCell<Result<T, E>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T, E> SingleFlight<T, E>
where
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.cell.get_or_init(init).await {
            Ok(value) => Ok(value),
            Err(err) => Err(err.clone()),
        }
    }

    /// The settled outcome, if the initializer already ran.
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.cell.get()
    }
}

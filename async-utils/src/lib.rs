mod single_flight;

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub use single_flight::SingleFlight;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CancelErr {
    Cancelled,
}

/// Races a future against a cancellation token.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}

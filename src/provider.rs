pub mod csv;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::model::PriceHistory;

/// Source of daily price history for an instrument.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn HistoryProvider`).
pub trait HistoryProvider: Send + Sync {
    /// Fetch the history for `ticker`, keeping only the trailing `lookback`
    /// bars when given. The returned history is already validated.
    fn fetch_history(
        &self,
        ticker: &str,
        lookback: Option<usize>,
    ) -> BoxFuture<'_, Result<PriceHistory, Report<ProviderError>>>;
}

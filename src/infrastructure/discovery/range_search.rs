//! Population bound search over a dense, 1-based address space.

use std::future::Future;

use crate::domain::errors::DiscoveryError;

/// Finds the highest index for which `probe` reports true, assuming every
/// index below it also exists.
///
/// Doubles the candidate until a probe misses (or `ceiling` is reached),
/// then binary-searches the gap. Returns `Ok(None)` if index 1 is missing.
///
/// # Errors
/// Propagates the first probe error.
pub async fn find_upper_bound<F, Fut>(mut probe: F, ceiling: u64) -> Result<Option<u64>, DiscoveryError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool, DiscoveryError>>,
{
    if ceiling == 0 || !probe(1).await? {
        return Ok(None);
    }

    let mut low: u64 = 1;
    let high = loop {
        let next = low.saturating_mul(2).min(ceiling);
        if next == low {
            return Ok(Some(low));
        }
        if probe(next).await? {
            low = next;
        } else {
            break next;
        }
    };

    let mut high = high;
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if probe(mid).await? {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(Some(low))
}

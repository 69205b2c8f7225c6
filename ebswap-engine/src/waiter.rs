use ebswap_core::{Result, SwapError, WaitBudget};
use std::future::Future;
use tokio::time::sleep;
use tracing::debug;

/// Outcome of a single status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Ready,
    Pending(String),
    /// The resource can no longer reach the awaited state.
    Failed(String),
}

/// Polls `check` until it reports [`Poll::Ready`], sleeping `budget.delay()`
/// between attempts. Fails with `WaitTimeout` once `budget.max_attempts`
/// polls have been spent.
pub async fn wait_until<F, Fut>(
    resource: &str,
    target: &str,
    budget: WaitBudget,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll>>,
{
    for attempt in 1..=budget.max_attempts {
        match check().await? {
            Poll::Ready => {
                debug!("{} reached {} after {} attempts", resource, target, attempt);
                return Ok(());
            }
            Poll::Failed(state) => {
                return Err(SwapError::TerminalState {
                    resource: resource.to_string(),
                    target: target.to_string(),
                    state,
                });
            }
            Poll::Pending(state) => {
                debug!(
                    "{} is {} (attempt {}/{}), waiting for {}",
                    resource, state, attempt, budget.max_attempts, target
                );
                if attempt < budget.max_attempts {
                    sleep(budget.delay()).await;
                }
            }
        }
    }

    Err(SwapError::WaitTimeout {
        resource: resource.to_string(),
        target: target.to_string(),
        attempts: budget.max_attempts,
    })
}

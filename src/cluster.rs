//! Sequential fail-over across a cluster of resolved server addresses.
//!
//! One server name usually resolves to several addresses. The clustered
//! operation runs an idempotent per-address operation against each address
//! in resolver order until one succeeds, a halting failure occurs, or an
//! optional overall time budget runs out. The per-address operation reports
//! how the loop should proceed through [`ServiceResult`]; the loop never
//! reorders addresses and never throws from failure paths.

use std::net::IpAddr;

use log::{debug, warn};

use crate::error::UnknownHostError;
use crate::net::Network;
use crate::time::{Duration, Ticker, Ticks};

/// Outcome of one per-address attempt.
#[derive(Debug)]
pub enum ServiceResult<S, F> {
    /// The attempt produced a definitive answer; the loop stops.
    Success(S),
    /// The attempt failed in a way that says nothing about the other
    /// addresses; the loop advances.
    FailureAdvance(F),
    /// The attempt failed in a way that makes trying further addresses
    /// pointless; the loop stops.
    FailureHalt(F),
    /// The attempt ran out the overall time budget. The loop verifies the
    /// claim and stops. An operation may only report this when the budget
    /// is genuinely exhausted.
    TimeAllowedExceeded(F),
}

/// Whole-cluster outcome kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteredServiceKind {
    Success,
    Failure,
    TimeAllowedExceeded,
}

/// Result of running a clustered operation to completion.
#[derive(Debug)]
pub struct ClusteredServiceResult<S, F> {
    kind: ClusteredServiceKind,
    addresses: Vec<IpAddr>,
    success: Option<S>,
    failures: Vec<F>,
    halted: bool,
}

impl<S, F> ClusteredServiceResult<S, F> {
    #[must_use]
    pub fn kind(&self) -> ClusteredServiceKind {
        self.kind
    }

    /// All addresses the resolver returned, in resolver order.
    #[must_use]
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    #[must_use]
    pub fn success(&self) -> Option<&S> {
        self.success.as_ref()
    }

    /// Failure payloads in attempt order.
    #[must_use]
    pub fn failures(&self) -> &[F] {
        &self.failures
    }

    /// Whether the loop stopped before exhausting the address list.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Decomposes the result into its parts, in field order.
    #[must_use]
    pub fn into_parts(self) -> (ClusteredServiceKind, Vec<IpAddr>, Option<S>, Vec<F>, bool) {
        (
            self.kind,
            self.addresses,
            self.success,
            self.failures,
            self.halted,
        )
    }
}

/// Runs a per-address operation over a resolved cluster with an optional
/// overall time budget.
pub struct ClusteredServiceOperation<'a> {
    network: &'a dyn Network,
    ticker: &'a dyn Ticker,
}

impl<'a> ClusteredServiceOperation<'a> {
    #[must_use]
    pub fn new(network: &'a dyn Network, ticker: &'a dyn Ticker) -> ClusteredServiceOperation<'a> {
        ClusteredServiceOperation { network, ticker }
    }

    /// Resolves `server_name` and applies `operation` to each address in
    /// order.
    ///
    /// `operation` receives the server name, the candidate address, `param`,
    /// and the remaining time budget (`None` when unbounded). Name
    /// resolution is charged against the budget, so a slow resolver can
    /// exhaust it before any attempt is made.
    ///
    /// # Errors
    ///
    /// [`UnknownHostError`] when resolution fails; every other failure is
    /// reported inside the returned [`ClusteredServiceResult`].
    ///
    /// # Panics
    ///
    /// Panics if `time_allowed` is non-positive, or if `operation` reports
    /// [`ServiceResult::TimeAllowedExceeded`] while budget remains — both
    /// are programming errors.
    pub fn execute<P, S, F, Op>(
        &self,
        server_name: &str,
        param: &P,
        time_allowed: Option<Duration>,
        operation: &mut Op,
    ) -> Result<ClusteredServiceResult<S, F>, UnknownHostError>
    where
        Op: FnMut(&str, IpAddr, &P, Option<Duration>) -> ServiceResult<S, F>,
    {
        if let Some(budget) = time_allowed {
            assert!(
                budget > Duration::ZERO,
                "time allowed {budget} must be positive"
            );
        }

        let ticks_before = self.ticker.ticks();
        let addresses = self.network.get_all_by_name(server_name)?;
        let mut failures: Vec<F> = Vec::new();

        for (index, address) in addresses.iter().enumerate() {
            let remaining = self.remaining(time_allowed, ticks_before, self.ticker.ticks());
            if let Some(budget_left) = remaining {
                if budget_left <= Duration::ZERO {
                    debug!(
                        "time allowed exhausted before attempt {index} against {server_name}"
                    );
                    return Ok(ClusteredServiceResult {
                        kind: ClusteredServiceKind::TimeAllowedExceeded,
                        addresses,
                        success: None,
                        failures,
                        halted: false,
                    });
                }
            }

            let outcome = operation(server_name, *address, param, remaining);
            let ticks_after = self.ticker.ticks();

            match outcome {
                ServiceResult::Success(value) => {
                    return Ok(ClusteredServiceResult {
                        kind: ClusteredServiceKind::Success,
                        addresses,
                        success: Some(value),
                        failures,
                        halted: true,
                    });
                }
                ServiceResult::FailureAdvance(failure) => {
                    warn!("attempt against {address} failed, advancing");
                    failures.push(failure);
                }
                ServiceResult::FailureHalt(failure) => {
                    warn!("attempt against {address} failed, halting");
                    failures.push(failure);
                    return Ok(ClusteredServiceResult {
                        kind: ClusteredServiceKind::Failure,
                        addresses,
                        success: None,
                        failures,
                        halted: true,
                    });
                }
                ServiceResult::TimeAllowedExceeded(failure) => {
                    let still_left = self
                        .remaining(time_allowed, ticks_before, ticks_after)
                        .map_or(true, |left| left > Duration::ZERO);
                    assert!(
                        !still_left,
                        "operation reported time allowed exceeded with budget remaining"
                    );
                    failures.push(failure);
                    return Ok(ClusteredServiceResult {
                        kind: ClusteredServiceKind::TimeAllowedExceeded,
                        addresses,
                        success: None,
                        failures,
                        halted: false,
                    });
                }
            }
        }

        Ok(ClusteredServiceResult {
            kind: ClusteredServiceKind::Failure,
            addresses,
            success: None,
            failures,
            halted: false,
        })
    }

    fn remaining(
        &self,
        time_allowed: Option<Duration>,
        since: Ticks,
        now: Ticks,
    ) -> Option<Duration> {
        time_allowed.map(|budget| budget - self.ticker.duration_between(since, now))
    }
}

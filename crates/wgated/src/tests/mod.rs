//! Test suites for the gateway daemon.

mod bootstrap_behaviour;
pub(crate) mod support;
mod unit;

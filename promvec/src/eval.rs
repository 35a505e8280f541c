//! Boundary with an expression parser.
//!
//! The parser itself lives outside this crate; whatever it produces
//! must evaluate to a [`Value`] given one vector or scalar per metric
//! name referenced by the expression.

use rustc_hash::FxHashMap;

use crate::{error::Result, value::Value};

/// One operand per metric name referenced by an expression.
pub type Bindings = FxHashMap<String, Value>;

/// The shape a parsed expression tree exposes to a host: the host
/// populates per-timestamp vectors (via [`InstantVector::push`]), binds
/// them by metric name, and evaluates once per timestamp bucket.
/// Buckets are independent, so a host may evaluate them in parallel as
/// long as each vector is no longer pushed to.
///
/// [`InstantVector::push`]: crate::value::InstantVector::push
pub trait Evaluate {
    fn evaluate(&self, bindings: &Bindings) -> Result<Value>;
}

//! Date-assigning engines.
//!
//! `asap` places every task at its earliest feasible dates; `shift` moves one
//! task (and optionally its subtree) under predecessor constraints. Both roll
//! the affected ancestors up before returning.

mod asap;
mod shift;

pub use asap::asap_schedule;
pub use shift::{earliest_allowed_start, set_dates, shift, shift_by, ShiftOutcome, TaskMove};

//! Integrators that drive a [`HybridSystem`](hybrid_core::HybridSystem).
//!
//! Both integrators share one stepping loop. It lands exactly on `t_final`,
//! on every print point, and on every time reported by
//! [`time_events`](hybrid_core::HybridSystem::time_events). It also compares
//! state-event indicators between accepted steps and calls back into the
//! system. They differ only in how a single step is taken:
//!
//! - [`ImplicitEuler`]: adaptive backward Euler with a Newton solve, suited to
//!   stiff systems.
//! - [`ExplicitEuler`]: fixed-step forward Euler.

mod driver;

pub mod explicit_euler;
pub mod implicit_euler;

pub use explicit_euler::ExplicitEuler;
pub use implicit_euler::ImplicitEuler;

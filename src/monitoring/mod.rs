/*!
 * Monitoring
 * Tracing subscriber setup
 */

pub mod tracer;

pub use tracer::{init_test_tracing, init_tracing};

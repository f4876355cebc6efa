//! Cross-dataset record correlation.
//!
//! - **Index**: per-side lookup by internal id and by external id
//! - **Correlator**: source id → equivalent target record
//!
//! Both are built once per migration task and never mutated afterwards.

mod correlator;
mod index;

pub use correlator::{correlate, Correlation, CorrelationStats};
pub use index::{CollisionPolicy, RecordIndex};

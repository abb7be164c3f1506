//! Output files.
//!
//! - [`json`]: the published snapshot (read back as the next run's prior
//!   state) and the optional run report
//!
//! ```text
//! output_path         # top-level JSON array consumed by the front end
//! report_path         # optional counts and final stage of the run
//! ```

pub mod json;

//! Domain models
//!
//! The paper record with its change-tracking baseline, the closed label
//! sets, and the result shapes returned by external services.

mod external;
mod labels;
mod paper;

pub use external::{ExternalPaper, Recommendation};
pub use labels::{AttackType, Focus, LabelChoice};
pub use paper::{Paper, PaperSnapshot, MAX_DISPLAY_AUTHORS};

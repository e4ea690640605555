//! Panel specs, metric overrides and descriptor construction.

mod descriptor;
mod overrides;
mod spec;

pub use descriptor::*;
pub use overrides::*;
pub use spec::*;

use crate::params::ParamError;
use thiserror::Error;

/// Panel construction error types. None of these escape the panel they
/// belong to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    #[error("panel `{panel}`: invalid panel spec: {reason}")]
    InvalidPanelSpec { panel: String, reason: String },
    #[error("panel `{panel}`: {source}")]
    Params {
        panel: String,
        #[source]
        source: ParamError,
    },
    #[error("panel `{panel}`: row {row} has no `{field}` field")]
    MissingResultField {
        panel: String,
        field: String,
        row: usize,
    },
}

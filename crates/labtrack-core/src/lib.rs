//! Sample lifecycle and plate-batch allocation for the DNA lab tracker.
//!
//! - [`sequencer`] - scan-based lab and case numbering
//! - [`family`] - canonical family order
//! - [`workflow`] - the sample state machine and its audit trail
//! - [`allocator`] - pure plate allocation
//! - [`batch`] - committing and completing plate batches
//! - [`service`] - [`LabService`], the operations exposed to callers

pub mod allocator;
pub mod batch;
pub mod clock;
pub mod config;
pub mod error;
pub mod family;
pub mod intake;
pub mod redact;
pub mod sequencer;
pub mod service;
pub mod workflow;

pub use allocator::{
    ControlPlacement, FamilyGroup, PlateRequest, PlateSample, allocate_plate, fill_column,
    standard_controls,
};
pub use batch::{BatchCompletion, BatchDetail, BatchMeta};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, DEFAULT_CONFIG_FILE, LabConfig};
pub use error::{ErrorKind, LabError, Result};
pub use intake::{NewCase, NewMember, NewSample, Registration};
pub use service::LabService;
pub use workflow::{RejectReason, RejectedSample, TransitionOutcome, check_transition};

//! # Campaign Subsystem
//!
//! Campaign lifecycle: the registry owns campaign state, the dispatcher
//! drives the outbound dialing passes and retry rounds, and the shared
//! types define the wire-visible vocabulary (clients, outcomes, records).

pub mod dispatcher;
pub mod registry;
pub mod types;

pub use dispatcher::{CallWindow, DialPolicy, Dispatcher};
pub use registry::{Campaign, CampaignRegistry, CampaignSummary};
pub use types::{CallOutcome, CallRecord, CampaignStatus, ClientTarget};

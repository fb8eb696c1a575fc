//! Short-code issuance, click recording, and redirect resolution for tracking links.

pub mod codes;
pub mod ledger;
pub mod router;
pub mod service;

pub use codes::{
    RandomShortCodes, ShortCode, ShortCodeSource, DEFAULT_TRACKING_BASE_URL, SHORT_CODE_LEN,
};
pub use ledger::{ClickEvent, ClickLedger, ClickMetadata, LinkStats};
pub use router::tracking_router;
pub use service::{ResolvedLink, TrackingError, TrackingService};

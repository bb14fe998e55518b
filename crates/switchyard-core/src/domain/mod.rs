//! # Domain Models
//!
//! Typed records exchanged with upstream providers and returned in the
//! composite dashboard.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SubjectId`] | Opaque aggregation target id |
//! | [`SubjectIdentity`] | Locally resolved identity |
//! | [`ProfileSummary`] | Profile listing entry |
//! | [`SubscriptionSummary`] | Active subscription |
//! | [`PaymentRecord`] | Billing history entry |
//! | [`ContentSummary`] | Catalog entry |
//! | [`WatchHistory`] | Local synthetic usage section |

mod models;
mod subject;

pub use models::{
    ContentSummary, PaymentRecord, PlanSummary, ProfileSummary, SubscriptionSummary, WatchHistory,
};
pub use subject::{SubjectDirectory, SubjectId, SubjectIdentity, SubjectResolver};

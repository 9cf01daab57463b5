//! Approval reviewer adapters

mod channel;

pub use channel::{ChannelApprovalReviewer, ReviewTicket};

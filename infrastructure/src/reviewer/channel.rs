//! Channel-based approval reviewer.
//!
//! Each review becomes a [`ReviewTicket`] on an `mpsc` channel. Whoever
//! holds the receiving end (a console prompt, a chat bot, a web handler)
//! answers through the ticket's `oneshot` responder.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use wallbounce_application::{ApprovalReviewer, ReviewError, ReviewNotice, ReviewVerdict};

/// One pending review.
#[derive(Debug)]
pub struct ReviewTicket {
    pub notice: ReviewNotice,
    responder: oneshot::Sender<ReviewVerdict>,
}

impl ReviewTicket {
    /// Send the verdict back. Returns `false` when nobody waits any more
    /// (the review timed out or the request was cancelled).
    pub fn respond(self, verdict: ReviewVerdict) -> bool {
        self.responder.send(verdict).is_ok()
    }

    pub fn approve(self, reviewer_id: impl Into<String>) -> bool {
        let verdict = ReviewVerdict::approve(self.notice.request_id, reviewer_id);
        self.respond(verdict)
    }

    pub fn deny(self, reviewer_id: impl Into<String>) -> bool {
        let verdict = ReviewVerdict::deny(self.notice.request_id, reviewer_id);
        self.respond(verdict)
    }
}

pub struct ChannelApprovalReviewer {
    tickets: mpsc::Sender<ReviewTicket>,
}

impl ChannelApprovalReviewer {
    /// Create a reviewer and the receiving end of its ticket queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReviewTicket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tickets: tx }, rx)
    }
}

#[async_trait]
impl ApprovalReviewer for ChannelApprovalReviewer {
    async fn review(&self, notice: ReviewNotice) -> Result<ReviewVerdict, ReviewError> {
        let request_id = notice.request_id;
        let (responder, verdict) = oneshot::channel();
        self.tickets
            .send(ReviewTicket { notice, responder })
            .await
            .map_err(|_| ReviewError::ChannelClosed)?;
        debug!(request_id = %request_id, "Review ticket queued");

        // A ticket dropped without an answer means the reviewer went away.
        verdict.await.map_err(|_| ReviewError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbounce_application::ReviewDecision;
    use wallbounce_domain::{RequestId, RiskLevel};

    fn notice() -> ReviewNotice {
        ReviewNotice {
            request_id: RequestId::new(),
            risk_level: RiskLevel::Critical,
            consensus_summary: "drop the table".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ticket_answer_reaches_caller() {
        let (reviewer, mut tickets) = ChannelApprovalReviewer::channel(4);
        let answering = tokio::spawn(async move {
            let ticket = tickets.recv().await.unwrap();
            assert_eq!(ticket.notice.risk_level, RiskLevel::Critical);
            assert!(ticket.approve("ops-lead"));
        });

        let n = notice();
        let verdict = reviewer.review(n.clone()).await.unwrap();
        assert_eq!(verdict.request_id, n.request_id);
        assert_eq!(verdict.decision, ReviewDecision::Approve);
        assert_eq!(verdict.reviewer_id, "ops-lead");
        answering.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (reviewer, tickets) = ChannelApprovalReviewer::channel(1);
        drop(tickets);
        assert_eq!(
            reviewer.review(notice()).await.unwrap_err(),
            ReviewError::ChannelClosed
        );
    }

    #[tokio::test]
    async fn test_dropped_ticket_is_cancelled() {
        let (reviewer, mut tickets) = ChannelApprovalReviewer::channel(1);
        tokio::spawn(async move {
            let ticket = tickets.recv().await;
            drop(ticket);
        });
        assert_eq!(
            reviewer.review(notice()).await.unwrap_err(),
            ReviewError::Cancelled
        );
    }
}

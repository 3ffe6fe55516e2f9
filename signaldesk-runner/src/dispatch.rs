//! Report dispatcher — render, split, then send a ranked list part by part.
//!
//! Parts are sent sequentially in rank order. A failed part is logged and
//! recorded, then the next part is attempted. Nothing is retried.

use std::fmt;

use signaldesk_core::BacktestResult;

use crate::channel::{FormatHint, MessageChannel};
use crate::error::DeliveryError;
use crate::report::{render_cells, table_from_cells, wrap_message, ChunkPolicy};

/// Phases of a single dispatch, in order. Never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchPhase {
    Idle,
    Rendering,
    Chunking,
    Sending,
    Done,
}

/// Outcome of dispatching one strategy's report.
#[derive(Debug)]
pub struct DispatchSummary {
    pub strategy: String,
    pub total_parts: usize,
    /// Part numbers delivered, in send order.
    pub delivered: Vec<usize>,
    /// Part numbers that failed, with the cause.
    pub failed: Vec<(usize, DeliveryError)>,
}

impl DispatchSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} parts delivered",
            self.strategy,
            self.delivered.len(),
            self.total_parts
        )?;
        if !self.failed.is_empty() {
            let parts: Vec<String> = self.failed.iter().map(|(p, _)| p.to_string()).collect();
            write!(f, " (failed: {})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Sends ranked results to one destination through one channel.
pub struct ReportDispatcher<'a, C: MessageChannel + ?Sized> {
    channel: &'a C,
    destination: &'a str,
    policy: ChunkPolicy,
}

impl<'a, C: MessageChannel + ?Sized> ReportDispatcher<'a, C> {
    pub fn new(channel: &'a C, destination: &'a str, policy: ChunkPolicy) -> Self {
        Self {
            channel,
            destination,
            policy,
        }
    }

    /// Render, split and send every part. Always attempts every part.
    pub fn dispatch(&self, strategy: &str, ranked: &[BacktestResult]) -> DispatchSummary {
        let mut phase = DispatchPhase::Idle;

        advance(&mut phase, DispatchPhase::Rendering, strategy);
        let cells = render_cells(ranked);

        advance(&mut phase, DispatchPhase::Chunking, strategy);
        let chunks = self.policy.split(strategy, ranked);

        let mut summary = DispatchSummary {
            strategy: strategy.to_string(),
            total_parts: chunks.len(),
            delivered: Vec::with_capacity(chunks.len()),
            failed: Vec::new(),
        };

        if chunks.is_empty() {
            tracing::info!(strategy, "no results, nothing to send");
            advance(&mut phase, DispatchPhase::Done, strategy);
            return summary;
        }

        advance(&mut phase, DispatchPhase::Sending, strategy);
        let mut offset = 0;
        for chunk in &chunks {
            let rows = &cells[offset..offset + chunk.rows.len()];
            offset += chunk.rows.len();
            let text = wrap_message(strategy, chunk.part, &table_from_cells(rows));

            match self.channel.send(self.destination, &text, FormatHint::Html) {
                Ok(()) => {
                    tracing::info!(
                        strategy,
                        part = chunk.part,
                        total = summary.total_parts,
                        channel = self.channel.name(),
                        "report part sent"
                    );
                    summary.delivered.push(chunk.part);
                }
                Err(err) => {
                    tracing::error!(
                        strategy,
                        part = chunk.part,
                        total = summary.total_parts,
                        channel = self.channel.name(),
                        error = %err,
                        "report part delivery failed"
                    );
                    summary.failed.push((chunk.part, err));
                }
            }
        }

        advance(&mut phase, DispatchPhase::Done, strategy);
        summary
    }
}

fn advance(phase: &mut DispatchPhase, next: DispatchPhase, strategy: &str) {
    debug_assert!(next > *phase, "dispatch phase went backwards");
    tracing::debug!(strategy, from = ?*phase, to = ?next, "dispatch phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every send; fails the parts listed in `fail_parts` (1-based call order).
    struct FakeChannel {
        sent: RefCell<Vec<String>>,
        fail_parts: Vec<usize>,
    }

    impl FakeChannel {
        fn failing(fail_parts: Vec<usize>) -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                fail_parts,
            }
        }
    }

    impl MessageChannel for FakeChannel {
        fn name(&self) -> &str {
            "fake"
        }

        fn send(&self, _dest: &str, text: &str, format: FormatHint) -> Result<(), DeliveryError> {
            assert_eq!(format, FormatHint::Html);
            let mut sent = self.sent.borrow_mut();
            sent.push(text.to_string());
            if self.fail_parts.contains(&sent.len()) {
                return Err(DeliveryError::Transport("connection reset".into()));
            }
            Ok(())
        }
    }

    fn rows(n: usize) -> Vec<BacktestResult> {
        (0..n)
            .map(|i| BacktestResult::new(format!("T{i}"), "BUY", 1.0, -(i as f64)))
            .collect()
    }

    #[test]
    fn failed_middle_part_does_not_stop_later_parts() {
        let channel = FakeChannel::failing(vec![2]);
        let dispatcher =
            ReportDispatcher::new(&channel, "chat", ChunkPolicy::RowCount { max_rows: 2 });

        let summary = dispatcher.dispatch("RSIStrategy", &rows(6));

        assert_eq!(summary.total_parts, 3);
        assert_eq!(summary.delivered, vec![1, 3]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, 2);
        assert_eq!(channel.sent.borrow().len(), 3);
        assert!(!summary.is_complete());
    }

    #[test]
    fn parts_are_sent_in_rank_order() {
        let channel = FakeChannel::failing(vec![]);
        let dispatcher =
            ReportDispatcher::new(&channel, "chat", ChunkPolicy::RowCount { max_rows: 2 });

        dispatcher.dispatch("S", &rows(5));

        let sent = channel.sent.borrow();
        assert!(sent[0].contains("Part 1") && sent[0].contains("T0") && sent[0].contains("T1"));
        assert!(sent[1].contains("Part 2") && sent[1].contains("T2") && sent[1].contains("T3"));
        assert!(sent[2].contains("Part 3") && sent[2].contains("T4"));
    }

    #[test]
    fn all_parts_failing_still_attempts_each() {
        let channel = FakeChannel::failing(vec![1, 2, 3]);
        let dispatcher =
            ReportDispatcher::new(&channel, "chat", ChunkPolicy::RowCount { max_rows: 1 });

        let summary = dispatcher.dispatch("S", &rows(3));

        assert!(summary.delivered.is_empty());
        assert_eq!(summary.attempted(), 3);
    }

    #[test]
    fn empty_results_send_nothing() {
        let channel = FakeChannel::failing(vec![]);
        let dispatcher = ReportDispatcher::new(&channel, "chat", ChunkPolicy::default());

        let summary = dispatcher.dispatch("S", &[]);

        assert_eq!(summary.total_parts, 0);
        assert!(channel.sent.borrow().is_empty());
        assert!(summary.is_complete());
    }

    #[test]
    fn summary_display_lists_failures() {
        let summary = DispatchSummary {
            strategy: "RSIStrategy".into(),
            total_parts: 3,
            delivered: vec![1, 3],
            failed: vec![(2, DeliveryError::Other("x".into()))],
        };
        assert_eq!(
            summary.to_string(),
            "RSIStrategy: 2/3 parts delivered (failed: 2)"
        );
    }
}

use image::DynamicImage;

use crate::detect::PageRanker;
use crate::entities::PageNumber;

/// How the cover page was chosen. `Fallback` marks a degraded outcome and
/// is surfaced in the batch audit log; it is never silently folded into a
/// successful ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Only one candidate existed; no ranker was consulted.
    Only,
    /// The ranker chose a valid candidate.
    Ranked,
    /// No ranker, ranker failure, or a choice matching no candidate;
    /// defaulted to the first candidate in input order.
    Fallback,
}

/// Pick exactly one page render out of the candidates.
///
/// Returns `None` only for an empty candidate list. The fallback-to-first
/// policy is deterministic: candidates keep their input order.
pub fn select_cover_page(
    mut candidates: Vec<(PageNumber, DynamicImage)>,
    ranker: Option<&dyn PageRanker>,
) -> Option<((PageNumber, DynamicImage), SelectionOutcome)> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some((candidates.remove(0), SelectionOutcome::Only));
    }

    let Some(ranker) = ranker else {
        tracing::warn!("no page ranker available, falling back to first page");
        return Some((candidates.remove(0), SelectionOutcome::Fallback));
    };

    match ranker.select_best_page(&candidates) {
        Some(page) => match candidates.iter().position(|(n, _)| *n == page) {
            Some(idx) => {
                tracing::debug!(page, "ranker selected cover page");
                Some((candidates.remove(idx), SelectionOutcome::Ranked))
            }
            None => {
                tracing::warn!(page, "ranker chose an unknown page, falling back to first");
                Some((candidates.remove(0), SelectionOutcome::Fallback))
            }
        },
        None => {
            tracing::warn!("page ranking failed, falling back to first page");
            Some((candidates.remove(0), SelectionOutcome::Fallback))
        }
    }
}

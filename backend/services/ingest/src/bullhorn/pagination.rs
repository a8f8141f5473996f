use std::collections::HashSet;
use std::fmt;

use super::client::BullhornClientError;
use super::models::{PageToken, WindowEntry};
use super::JobSource;

/// Why a walk ended before upstream ran out of pages or the cap was reached.
#[derive(Debug)]
pub enum Shortfall {
    Upstream(BullhornClientError),
    PageLimit { pages: usize },
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream(e) => write!(f, "upstream failure: {e}"),
            Self::PageLimit { pages } => write!(f, "stopped after {pages} pages"),
        }
    }
}

/// The bounded, de-duplicated upstream window for one run.
#[derive(Debug, Default)]
pub struct WindowOutcome {
    pub entries: Vec<WindowEntry>,
    pub pages: usize,
    pub shortfall: Option<Shortfall>,
}

impl WindowOutcome {
    pub fn is_truncated(&self) -> bool {
        self.shortfall.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walk the listing newest first until upstream has no more pages or `max_items`
/// distinct ids are collected.
///
/// The first occurrence of an id wins, so ids that shift between pages while the walk
/// is in progress are not counted twice. Auth failures, and any failure before the
/// first page arrives, are returned as errors. Later failures end the walk with what
/// was collected and record the shortfall.
pub async fn collect_window<S>(
    source: &S,
    max_items: usize,
) -> Result<WindowOutcome, BullhornClientError>
where
    S: JobSource + ?Sized,
{
    let mut outcome = WindowOutcome::default();
    if max_items == 0 {
        return Ok(outcome);
    }

    let page_size = source.page_size().max(1) as usize;
    let max_pages = max_items / page_size + 2;
    let mut seen: HashSet<String> = HashSet::with_capacity(max_items);
    let mut token: Option<PageToken> = None;

    loop {
        if outcome.pages >= max_pages {
            tracing::warn!(
                pages = outcome.pages,
                collected = outcome.entries.len(),
                "upstream kept paginating past the page limit"
            );
            outcome.shortfall = Some(Shortfall::PageLimit {
                pages: outcome.pages,
            });
            break;
        }

        let page = match source.list_recent_ids(token).await {
            Ok(page) => page,
            Err(e) if e.is_fatal() || outcome.pages == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(
                    pages = outcome.pages,
                    collected = outcome.entries.len(),
                    error = %e,
                    "window walk stopped early"
                );
                outcome.shortfall = Some(Shortfall::Upstream(e));
                break;
            }
        };
        outcome.pages += 1;

        for entry in page.entries {
            if !seen.insert(entry.external_id.clone()) {
                continue;
            }
            outcome.entries.push(entry);
            if outcome.entries.len() >= max_items {
                return Ok(outcome);
            }
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(outcome)
}

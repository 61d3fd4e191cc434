//! Records when node bodies start and end, for ordering and overlap checks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use suitedag::exec::Body;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Start(String),
    End(String),
}

/// Shared, append-only log of body start/end marks.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    marks: Arc<Mutex<Vec<Mark>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, label: &str) {
        self.marks.lock().unwrap().push(Mark::Start(label.to_string()));
    }

    pub fn end(&self, label: &str) {
        self.marks.lock().unwrap().push(Mark::End(label.to_string()));
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.marks.lock().unwrap().clone()
    }

    /// Labels in the order their bodies started.
    pub fn started(&self) -> Vec<String> {
        self.marks()
            .into_iter()
            .filter_map(|m| match m {
                Mark::Start(label) => Some(label),
                Mark::End(_) => None,
            })
            .collect()
    }

    /// Highest number of bodies that were between start and end at once.
    pub fn max_overlap(&self) -> usize {
        let mut open = 0usize;
        let mut max = 0usize;
        for mark in self.marks() {
            match mark {
                Mark::Start(_) => {
                    open += 1;
                    max = max.max(open);
                }
                Mark::End(_) => open = open.saturating_sub(1),
            }
        }
        max
    }

    /// Whether `label` was running while any other body was.
    pub fn overlapped(&self, label: &str) -> bool {
        let mut open: Vec<String> = Vec::new();
        for mark in self.marks() {
            match mark {
                Mark::Start(l) => {
                    let target_open = open.iter().any(|o| o == label);
                    if (l == label && !open.is_empty()) || target_open {
                        return true;
                    }
                    open.push(l);
                }
                Mark::End(l) => {
                    if let Some(pos) = open.iter().position(|o| *o == l) {
                        open.remove(pos);
                    }
                }
            }
        }
        false
    }

    /// Synchronous body that records itself.
    pub fn sync_body(&self, label: &str) -> Body {
        let journal = self.clone();
        let label = label.to_string();
        Body::sync(move |_| {
            journal.start(&label);
            journal.end(&label);
            Ok(())
        })
    }

    /// Async body that records itself and sleeps for `delay` in between.
    pub fn async_body(&self, label: &str, delay: Duration) -> Body {
        let journal = self.clone();
        let label = label.to_string();
        Body::future(move |_| {
            let journal = journal.clone();
            let label = label.clone();
            async move {
                journal.start(&label);
                tokio::time::sleep(delay).await;
                journal.end(&label);
                Ok(())
            }
        })
    }
}

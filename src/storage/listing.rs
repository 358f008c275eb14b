//! Layered entry listing.
//!
//! A listing reads through several layers at once: optionally the branch's
//! staging area, then every segment of the lineage. Each layer yields its
//! effective rows in path order, one page at a time. The merge walks the
//! layers in lock step and, for every path, keeps the row of the first
//! layer that has one. Tombstones shadow lower layers and are then dropped.
//!
//! ```text
//!   staging   :  a      c(x)          e
//!   segment 0 :  a  b   c        d
//!   segment 1 :     b            d    e   f
//!                ─────────────────────────────
//!   merged    :  a  b            d    e   f      (c is tombstoned)
//! ```

use std::collections::VecDeque;

use crate::storage::branches::LineageSegment;
use crate::storage::entries::{self, EntryRow, PageBounds};
use crate::storage::errors::StorageResult;
use crate::storage::types::BranchId;
use crate::transaction::Tx;

/// where a layer reads its rows from
#[derive(Debug, Clone, Copy)]
enum Source {
    Staged(BranchId),
    Committed(LineageSegment),
}

struct Layer {
    source: Source,
    buffer: VecDeque<EntryRow>,
    /// path of the last row fetched
    cursor: String,
    exhausted: bool,
}

impl Layer {
    fn new(source: Source, after: &str) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            cursor: after.to_string(),
            exhausted: false,
        }
    }
}

/// Lazy, path-ordered merge of live entries across layers.
pub(crate) struct EntryMerge<'a, 't> {
    tx: &'a Tx<'t>,
    layers: Vec<Layer>,
    prefix: String,
    page_size: usize,
}

impl<'a, 't> EntryMerge<'a, 't> {
    /// Merge `lineage`, with the staging area of `staged` on top when given.
    ///
    /// Only paths starting with `prefix` and strictly greater than `after`
    /// are produced.
    pub fn new(
        tx: &'a Tx<'t>,
        staged: Option<BranchId>,
        lineage: &[LineageSegment],
        prefix: &str,
        after: &str,
        page_size: usize,
    ) -> Self {
        let layers = staged
            .map(Source::Staged)
            .into_iter()
            .chain(lineage.iter().copied().map(Source::Committed))
            .map(|source| Layer::new(source, after))
            .collect();

        Self {
            tx,
            layers,
            prefix: prefix.to_string(),
            page_size: page_size.max(1),
        }
    }

    /// the next live entry, or None once every layer is drained
    pub fn next_entry(&mut self) -> StorageResult<Option<EntryRow>> {
        loop {
            let mut smallest: Option<usize> = None;
            for index in 0..self.layers.len() {
                self.fill(index)?;
                let Some(head) = self.layers[index].buffer.front() else {
                    continue;
                };
                match smallest {
                    Some(best) if self.head_path(best) <= head.path.as_str() => {}
                    _ => smallest = Some(index),
                }
            }

            let Some(winner) = smallest else {
                return Ok(None);
            };

            // lower layers holding the same path are shadowed
            let row = self.layers[winner].buffer.pop_front();
            let Some(row) = row else {
                return Ok(None);
            };
            for layer in self.layers.iter_mut().skip(winner + 1) {
                if layer.buffer.front().is_some_and(|r| r.path == row.path) {
                    layer.buffer.pop_front();
                }
            }

            if !row.is_tombstone {
                return Ok(Some(row));
            }
        }
    }

    fn head_path(&self, index: usize) -> &str {
        self.layers[index]
            .buffer
            .front()
            .map(|r| r.path.as_str())
            .unwrap_or_default()
    }

    fn fill(&mut self, index: usize) -> StorageResult<()> {
        let layer = &mut self.layers[index];
        if !layer.buffer.is_empty() || layer.exhausted {
            return Ok(());
        }

        let bounds = PageBounds {
            prefix: &self.prefix,
            after: &layer.cursor,
            limit: self.page_size,
        };
        let page = match layer.source {
            Source::Staged(branch) => entries::page_staged(self.tx, branch, bounds)?,
            Source::Committed(segment) => entries::page_committed(self.tx, segment, bounds)?,
        };
        tracing::debug!(
            tx = %self.tx.id(),
            layer = index,
            rows = page.len(),
            after = %layer.cursor,
            "fetched listing page"
        );

        if page.len() < self.page_size {
            layer.exhausted = true;
        }
        if let Some(last) = page.last() {
            layer.cursor = last.path.clone();
        }
        layer.buffer.extend(page);
        Ok(())
    }
}

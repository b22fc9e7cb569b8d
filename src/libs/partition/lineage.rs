//! Which buffers are up to date, and what each internal one was computed from.

use super::Operation;

#[derive(Debug, Clone)]
pub(super) struct Lineage {
    tips: usize,
    valid: Vec<bool>,
    /// Operation that last wrote each buffer, `None` for tips
    sources: Vec<Option<Operation>>,
    /// Buffers whose source reads each buffer
    readers: Vec<Vec<usize>>,
}

impl Lineage {
    pub(super) fn new(tips: usize, buffers: usize) -> Self {
        Self {
            tips,
            valid: vec![false; buffers],
            sources: vec![None; buffers],
            readers: vec![vec![]; buffers],
        }
    }

    pub(super) fn is_valid(&self, buffer: usize) -> bool {
        self.valid.get(buffer).copied().unwrap_or(false)
    }

    /// `tip` holds new data.
    pub(super) fn replace_tip(&mut self, tip: usize) {
        self.invalidate_readers(tip);
        self.valid[tip] = true;
    }

    /// `op.parent` was recomputed from its children.
    pub(super) fn record(&mut self, op: &Operation) {
        if let Some(old) = self.sources[op.parent].take() {
            for child in [old.child1, old.child2] {
                self.readers[child].retain(|&b| b != op.parent);
            }
        }
        self.invalidate_readers(op.parent);

        for child in [op.child1, op.child2] {
            self.readers[child].push(op.parent);
        }
        self.sources[op.parent] = Some(*op);
        self.valid[op.parent] = true;
    }

    /// Buffers computed through a matrix in `slots` go stale, and so does
    /// everything computed from them.
    pub(super) fn invalidate_slots(&mut self, slots: &[usize]) {
        let hit: Vec<usize> = self
            .sources
            .iter()
            .enumerate()
            .filter_map(|(buffer, source)| match source {
                Some(op)
                    if slots.contains(&op.child1_matrix) || slots.contains(&op.child2_matrix) =>
                {
                    Some(buffer)
                }
                _ => None,
            })
            .collect();

        for buffer in hit {
            if self.valid[buffer] {
                self.valid[buffer] = false;
                self.invalidate_readers(buffer);
            }
        }
    }

    /// Every internal buffer goes stale; tips stay.
    pub(super) fn invalidate_internal(&mut self) {
        let tips = self.tips;
        self.valid[tips..].fill(false);
    }

    fn invalidate_readers(&mut self, buffer: usize) {
        let mut stack = vec![buffer];
        while let Some(b) = stack.pop() {
            for &reader in &self.readers[b] {
                if self.valid[reader] {
                    self.valid[reader] = false;
                    stack.push(reader);
                }
            }
        }
    }
}

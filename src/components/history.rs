use std::collections::VecDeque;
use std::fmt;

use crate::canvas::{Color, PixelBuffer};
use crate::{log_info, log_warn};

// ============================================================================
// STRUCTURAL ACTION TRAIT
// ============================================================================

/// A reversible edit that does not decompose into per-pixel diffs
/// (resize, flip, rotate, clear, bleach).
///
/// The history never calls these itself; it hands the entry back from
/// `undo`/`redo` and the owner of the buffer applies it.
pub trait StructuralAction: Send + Sync {
    fn label(&self) -> String;
    fn undo(&self, canvas: &mut PixelBuffer);
    fn redo(&self, canvas: &mut PixelBuffer);
    fn memory_size(&self) -> usize;
}

// ============================================================================
// PIXEL CHANGES
// ============================================================================

/// One pixel's reversible mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelChange {
    pub index: usize,
    pub old: Color,
    pub new: Color,
}

impl PixelChange {
    pub fn new(index: usize, old: Color, new: Color) -> Self {
        Self { index, old, new }
    }

    pub fn revert(&self, canvas: &mut PixelBuffer) {
        canvas.set_pixel(self.index, self.old);
    }

    pub fn reapply(&self, canvas: &mut PixelBuffer) {
        canvas.set_pixel(self.index, self.new);
    }
}

/// Pixel changes undone and redone as one unit.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PixelChangeBatch {
    pub label: String,
    pub changes: Vec<PixelChange>,
}

impl PixelChangeBatch {
    pub fn new(label: impl Into<String>, changes: Vec<PixelChange>) -> Self {
        Self { label: label.into(), changes }
    }

    /// Restore old colors, last change first, so repeated writes to one
    /// pixel unwind to the color it had before the batch.
    pub fn revert(&self, canvas: &mut PixelBuffer) {
        for change in self.changes.iter().rev() {
            change.revert(canvas);
        }
    }

    pub fn reapply(&self, canvas: &mut PixelBuffer) {
        for change in &self.changes {
            change.reapply(canvas);
        }
    }
}

// ============================================================================
// HISTORY ENTRY
// ============================================================================

pub enum HistoryEntry {
    Pixel(PixelChange),
    Batch(PixelChangeBatch),
    Structural(Box<dyn StructuralAction>),
}

impl HistoryEntry {
    pub fn description(&self) -> String {
        match self {
            HistoryEntry::Pixel(c) => format!("Pixel {}", c.index),
            HistoryEntry::Batch(b) => format!("{} ({} px)", b.label, b.changes.len()),
            HistoryEntry::Structural(a) => a.label(),
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            HistoryEntry::Pixel(_) => std::mem::size_of::<PixelChange>(),
            HistoryEntry::Batch(b) => {
                b.changes.len() * std::mem::size_of::<PixelChange>() + b.label.len()
            }
            HistoryEntry::Structural(a) => a.memory_size(),
        }
    }

    /// Undo this entry against `canvas`.
    pub fn revert(&self, canvas: &mut PixelBuffer) {
        match self {
            HistoryEntry::Pixel(c) => c.revert(canvas),
            HistoryEntry::Batch(b) => b.revert(canvas),
            HistoryEntry::Structural(a) => a.undo(canvas),
        }
    }

    /// Redo this entry against `canvas`.
    pub fn reapply(&self, canvas: &mut PixelBuffer) {
        match self {
            HistoryEntry::Pixel(c) => c.reapply(canvas),
            HistoryEntry::Batch(b) => b.reapply(canvas),
            HistoryEntry::Structural(a) => a.redo(canvas),
        }
    }

    pub fn as_batch(&self) -> Option<&PixelChangeBatch> {
        match self {
            HistoryEntry::Batch(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEntry::Pixel(c) => f.debug_tuple("Pixel").field(c).finish(),
            HistoryEntry::Batch(b) => f.debug_tuple("Batch").field(b).finish(),
            HistoryEntry::Structural(a) => f.debug_tuple("Structural").field(&a.label()).finish(),
        }
    }
}

impl From<PixelChange> for HistoryEntry {
    fn from(c: PixelChange) -> Self {
        HistoryEntry::Pixel(c)
    }
}

impl From<PixelChangeBatch> for HistoryEntry {
    fn from(b: PixelChangeBatch) -> Self {
        HistoryEntry::Batch(b)
    }
}

impl From<Box<dyn StructuralAction>> for HistoryEntry {
    fn from(a: Box<dyn StructuralAction>) -> Self {
        HistoryEntry::Structural(a)
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with count and memory limits
// ============================================================================

const DEFAULT_BATCH_LABEL: &str = "Pixel Edit";

/// Undo/redo log with batching.
///
/// Batches nest by coalescing: every `begin_batch` must be matched by an
/// `end_batch`, and only the outermost `end_batch` commits the collected
/// changes as a single entry.
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    current_batch: Option<PixelChangeBatch>,
    batch_depth: usize,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("batch_depth", &self.batch_depth)
            .field("max_history_size", &self.max_history_size)
            .finish()
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            current_batch: None,
            batch_depth: 0,
            max_history_size,
            max_memory_bytes: Some(100 * 1024 * 1024), // 100 MB default limit
            total_memory: 0,
        }
    }

    /// Replace the memory cap. `None` disables it.
    pub fn with_memory_limit(mut self, max_memory_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self.prune();
        self
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    // ------------------------------------------------------------------
    //  Batching
    // ------------------------------------------------------------------

    pub fn begin_batch(&mut self) {
        self.begin_batch_labeled(DEFAULT_BATCH_LABEL);
    }

    /// Open a batch. When already inside one, the call only deepens the
    /// nesting and the outer label is kept.
    pub fn begin_batch_labeled(&mut self, label: impl Into<String>) {
        self.batch_depth += 1;
        if self.current_batch.is_none() {
            self.current_batch = Some(PixelChangeBatch::new(label, Vec::new()));
        }
    }

    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log_warn!("HistoryManager::end_batch called with no open batch");
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.flush_batch();
        }
    }

    pub fn is_batch_open(&self) -> bool {
        self.current_batch.is_some()
    }

    /// Commit whatever the open batch holds and close every nesting level.
    fn flush_batch(&mut self) {
        self.batch_depth = 0;
        if let Some(batch) = self.current_batch.take()
            && !batch.changes.is_empty()
        {
            self.push(HistoryEntry::Batch(batch));
        }
    }

    // ------------------------------------------------------------------
    //  Recording
    // ------------------------------------------------------------------

    /// Record an entry and invalidate the redo future.
    ///
    /// While a batch is open, pixel changes (and whole batches) are folded
    /// into it; structural actions always go straight onto the undo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.clear_redo();

        let entry = match (self.current_batch.as_mut(), entry) {
            (Some(batch), HistoryEntry::Pixel(change)) => {
                batch.changes.push(change);
                return;
            }
            (Some(batch), HistoryEntry::Batch(inner)) => {
                batch.changes.extend(inner.changes);
                return;
            }
            (_, other) => other,
        };

        self.total_memory += entry.memory_size();
        self.undo_stack.push_back(entry);
        self.prune();
    }

    // ------------------------------------------------------------------
    //  Undo / redo
    // ------------------------------------------------------------------

    /// Commit an open batch before the stacks move, then reopen an empty one
    /// at the same depth so later pushes and `end_batch` still pair up.
    fn commit_open_batch(&mut self) {
        let Some(label) = self.current_batch.as_ref().map(|b| b.label.clone()) else {
            return;
        };
        let depth = self.batch_depth;
        self.flush_batch();
        self.batch_depth = depth;
        self.current_batch = Some(PixelChangeBatch::new(label, Vec::new()));
    }

    /// Move the newest entry to the redo stack and return it so the caller
    /// can revert it. An open batch is committed first and stays open.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        self.commit_open_batch();
        let entry = self.undo_stack.pop_back()?;
        self.redo_stack.push_back(entry);
        self.redo_stack.back()
    }

    /// Move the newest undone entry back and return it so the caller can
    /// reapply it.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        self.commit_open_batch();
        let entry = self.redo_stack.pop_back()?;
        self.undo_stack.push_back(entry);
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|e| e.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|e| e.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|e| e.description()).collect()
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo_stack.iter()
    }

    /// Current memory usage of both stacks (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop everything, including an open batch. Used on new document / load.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.batch_depth = 0;
        self.total_memory = 0;
    }

    fn clear_redo(&mut self) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        }
    }

    /// Evict oldest entries past the count limit, then past the memory cap.
    /// The newest entry always survives the memory pass.
    fn prune(&mut self) {
        let mut evicted = 0usize;
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                evicted += 1;
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            log_info!(
                "History: evicted {} oldest entr{} ({} kept, {} bytes)",
                evicted,
                if evicted == 1 { "y" } else { "ies" },
                self.undo_stack.len(),
                self.total_memory
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RED: Color = Some(Rgba([255, 0, 0, 255]));
    const BLUE: Color = Some(Rgba([0, 0, 255, 255]));

    fn change(index: usize) -> HistoryEntry {
        HistoryEntry::Pixel(PixelChange::new(index, None, RED))
    }

    /// Comparable view of both stacks.
    fn state(h: &HistoryManager) -> (Vec<String>, Vec<String>) {
        (
            h.undo_stack.iter().map(|e| format!("{:?}", e)).collect(),
            h.redo_stack.iter().map(|e| format!("{:?}", e)).collect(),
        )
    }

    struct Counting {
        undos: Arc<AtomicUsize>,
    }

    impl StructuralAction for Counting {
        fn label(&self) -> String {
            "Counting".to_string()
        }
        fn undo(&self, _canvas: &mut PixelBuffer) {
            self.undos.fetch_add(1, Ordering::SeqCst);
        }
        fn redo(&self, _canvas: &mut PixelBuffer) {}
        fn memory_size(&self) -> usize {
            8
        }
    }

    #[test]
    fn empty_history_has_nothing_to_do() {
        let mut h = HistoryManager::new(10);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
    }

    #[test]
    fn undo_then_redo_restores_stack_state() {
        let mut h = HistoryManager::new(10);
        h.push(change(1));
        h.push(change(2));
        let before = state(&h);

        assert!(h.undo().is_some());
        assert_eq!(h.redo_count(), 1);
        assert!(h.redo().is_some());
        assert_eq!(state(&h), before);
    }

    #[test]
    fn undo_returns_the_moved_entry() {
        let mut h = HistoryManager::new(10);
        h.push(change(1));
        h.push(change(2));
        match h.undo() {
            Some(HistoryEntry::Pixel(c)) => assert_eq!(c.index, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.undo_count(), 1);
        assert_eq!(h.redo_count(), 1);
    }

    #[test]
    fn batch_is_a_single_undo_step_in_original_order() {
        let c1 = PixelChange::new(4, None, RED);
        let c2 = PixelChange::new(5, None, BLUE);
        let mut h = HistoryManager::new(10);
        h.begin_batch();
        h.push(c1.into());
        h.push(c2.into());
        h.end_batch();

        assert_eq!(h.undo_count(), 1);
        let undone = h.undo().and_then(|e| e.as_batch()).cloned();
        assert_eq!(undone.map(|b| b.changes), Some(vec![c1, c2]));
        assert!(!h.can_undo());
    }

    #[test]
    fn empty_batch_pushes_nothing() {
        let mut h = HistoryManager::new(10);
        h.begin_batch();
        h.end_batch();
        assert!(!h.can_undo());
        assert!(!h.is_batch_open());
    }

    #[test]
    fn nested_batches_coalesce_into_the_outer_one() {
        let mut h = HistoryManager::new(10);
        h.begin_batch_labeled("Stroke");
        h.push(change(1));
        h.begin_batch_labeled("Inner");
        h.push(change(2));
        h.end_batch();
        assert_eq!(h.undo_count(), 0);
        h.push(change(3));
        h.end_batch();

        assert_eq!(h.undo_history(), vec!["Stroke (3 px)".to_string()]);
    }

    #[test]
    fn unbalanced_end_batch_is_ignored() {
        let mut h = HistoryManager::new(10);
        h.end_batch();
        h.push(change(1));
        assert_eq!(h.undo_count(), 1);
    }

    #[test]
    fn structural_actions_bypass_an_open_batch() {
        let undos = Arc::new(AtomicUsize::new(0));
        let mut h = HistoryManager::new(10);
        h.begin_batch();
        h.push(change(1));
        h.push(HistoryEntry::Structural(Box::new(Counting { undos: undos.clone() })));
        assert_eq!(h.undo_count(), 1);
        h.end_batch();
        assert_eq!(h.undo_count(), 2);

        let mut canvas = PixelBuffer::new(1, 1);
        for _ in 0..2 {
            if let Some(entry) = h.undo() {
                entry.revert(&mut canvas);
            }
        }
        assert_eq!(undos.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undo_commits_an_open_batch_first() {
        let mut h = HistoryManager::new(10);
        h.begin_batch();
        h.push(change(1));
        assert!(h.undo().and_then(|e| e.as_batch()).is_some());
        assert!(h.is_batch_open());
        h.end_batch();
        assert!(!h.is_batch_open());
        assert_eq!(h.undo_count(), 0);
        assert_eq!(h.redo_count(), 1);
    }

    #[test]
    fn pushes_after_a_mid_batch_undo_land_in_a_fresh_batch() {
        let mut h = HistoryManager::new(10);
        h.begin_batch_labeled("Stroke");
        h.begin_batch();
        h.push(change(1));
        h.undo();
        h.push(change(2));
        h.push(change(3));
        assert_eq!(h.undo_count(), 0);
        assert!(!h.can_redo());
        h.end_batch();
        assert!(h.is_batch_open());
        h.end_batch();
        assert!(!h.is_batch_open());
        assert_eq!(h.undo_history(), vec!["Stroke (2 px)".to_string()]);
    }

    #[test]
    fn oldest_entry_is_evicted_past_the_limit() {
        let max = 5;
        let mut h = HistoryManager::new(max);
        for i in 0..=max {
            h.push(change(i));
        }
        assert_eq!(h.undo_count(), max);
        match h.undo_entries().next() {
            Some(HistoryEntry::Pixel(c)) => assert_eq!(c.index, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn push_after_undo_clears_redo() {
        let mut h = HistoryManager::new(10);
        h.push(change(1));
        h.push(change(2));
        h.undo();
        assert!(h.can_redo());
        h.push(change(3));
        assert!(!h.can_redo());
    }

    #[test]
    fn pushing_into_a_batch_also_clears_redo() {
        let mut h = HistoryManager::new(10);
        h.push(change(1));
        h.undo();
        h.begin_batch();
        h.push(change(2));
        assert!(!h.can_redo());
        h.end_batch();
    }

    #[test]
    fn memory_cap_evicts_but_keeps_newest() {
        let mut h = HistoryManager::new(100)
            .with_memory_limit(Some(3 * std::mem::size_of::<PixelChange>()));
        for i in 0..10 {
            h.push(change(i));
        }
        assert_eq!(h.undo_count(), 3);
        assert_eq!(h.memory_usage(), 3 * std::mem::size_of::<PixelChange>());

        let mut tiny = HistoryManager::new(100).with_memory_limit(Some(1));
        tiny.push(change(0));
        tiny.push(change(1));
        assert_eq!(tiny.undo_count(), 1);
    }

    #[test]
    fn batch_revert_runs_backwards_and_reapply_forwards() {
        let mut canvas = PixelBuffer::new(2, 1);
        let batch = PixelChangeBatch::new(
            "Stroke",
            vec![PixelChange::new(0, None, RED), PixelChange::new(0, RED, BLUE)],
        );
        batch.reapply(&mut canvas);
        assert_eq!(canvas.pixel(0), BLUE);
        batch.revert(&mut canvas);
        assert_eq!(canvas.pixel(0), None);
    }

    #[test]
    fn clear_drops_stacks_and_open_batch() {
        let mut h = HistoryManager::new(10);
        h.push(change(1));
        h.undo();
        h.push(change(2));
        h.begin_batch();
        h.push(change(3));
        h.clear();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(!h.is_batch_open());
        assert_eq!(h.memory_usage(), 0);
        h.end_batch();
        assert!(!h.can_undo());
    }
}

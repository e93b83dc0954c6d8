//! Undo/redo stacks of applied changes

use crate::change::{Change, IdSource};
use crate::config::HistoryConfig;
use crate::document::{Document, DocumentError};
use std::collections::VecDeque;

/// Linear undo/redo history.
///
/// The undo stack holds changes as they were applied; the redo stack holds
/// the inverses that undid them.
#[derive(Debug)]
pub struct ChangeHistory {
    done: VecDeque<Change>,
    undone: Vec<Change>,
    max_depth: usize,
}

impl Default for ChangeHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl ChangeHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            done: VecDeque::new(),
            undone: Vec::new(),
            max_depth: config.max_depth,
        }
    }

    /// Record a change that was just applied. Clears the redo stack.
    pub fn record(&mut self, change: Change) {
        self.undone.clear();
        self.done.push_back(change);
        while self.done.len() > self.max_depth {
            if let Some(evicted) = self.done.pop_front() {
                log::debug!("history full, dropping {}", evicted);
            }
        }
    }

    /// Undo the latest change. Returns the applied inverse.
    pub fn undo<I: IdSource + ?Sized>(
        &mut self,
        doc: &mut Document,
        ids: &I,
    ) -> Result<Option<Change>, DocumentError> {
        let Some(change) = self.done.pop_back() else {
            return Ok(None);
        };
        let inverse = change.invert(ids);
        if let Err(err) = doc.apply_change(&inverse) {
            self.done.push_back(change);
            return Err(err);
        }
        log::debug!("undid {} with {}", change, inverse);
        self.undone.push(inverse.clone());
        Ok(Some(inverse))
    }

    /// Re-apply the latest undone change. Returns the applied change.
    pub fn redo<I: IdSource + ?Sized>(
        &mut self,
        doc: &mut Document,
        ids: &I,
    ) -> Result<Option<Change>, DocumentError> {
        let Some(inverse) = self.undone.pop() else {
            return Ok(None);
        };
        let change = inverse.invert(ids);
        if let Err(err) = doc.apply_change(&change) {
            self.undone.push(inverse);
            return Err(err);
        }
        log::debug!("redid {} as {}", inverse, change);
        self.done.push_back(change.clone());
        Ok(Some(change))
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Number of undoable changes
    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeInfo, Operation, Path, SequentialIds};
    use serde_json::json;

    fn edit(ids: &SequentialIds, old: &str, new: &str) -> Change {
        Change::new(
            ids,
            &[Operation::set(["p1", "content"], json!(old), json!(new))],
            None,
            None,
            ChangeInfo::new(),
        )
    }

    fn content(doc: &Document) -> String {
        doc.get_path(&Path::property("p1", "content"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn setup() -> Document {
        let mut doc = Document::default();
        doc.create(json!({ "id": "p1", "type": "paragraph", "content": "a" }))
            .unwrap();
        doc
    }

    #[test]
    fn test_undo_redo() {
        let ids = SequentialIds::new("h");
        let mut doc = setup();
        let mut history = ChangeHistory::default();

        for (old, new) in [("a", "b"), ("b", "c")] {
            let change = edit(&ids, old, new);
            doc.apply_change(&change).unwrap();
            history.record(change);
        }
        assert_eq!(content(&doc), "c");

        let inverse = history.undo(&mut doc, &ids).unwrap().unwrap();
        assert_eq!(content(&doc), "b");
        assert!(inverse.has_updated("p1.content").unwrap());
        history.undo(&mut doc, &ids).unwrap();
        assert_eq!(content(&doc), "a");
        assert!(!history.can_undo());
        assert!(history.undo(&mut doc, &ids).unwrap().is_none());

        history.redo(&mut doc, &ids).unwrap();
        assert_eq!(content(&doc), "b");
        assert!(history.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let ids = SequentialIds::new("h");
        let mut doc = setup();
        let mut history = ChangeHistory::default();

        let change = edit(&ids, "a", "b");
        doc.apply_change(&change).unwrap();
        history.record(change);
        history.undo(&mut doc, &ids).unwrap();
        assert!(history.can_redo());

        let change = edit(&ids, "a", "z");
        doc.apply_change(&change).unwrap();
        history.record(change);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_depth_evicts_oldest() {
        let ids = SequentialIds::new("h");
        let mut history = ChangeHistory::new(&HistoryConfig { max_depth: 2 });
        for _ in 0..3 {
            history.record(edit(&ids, "a", "a"));
        }
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_failed_undo_keeps_change() {
        let ids = SequentialIds::new("h");
        let mut doc = setup();
        let mut history = ChangeHistory::default();
        let change = Change::new(
            &ids,
            &[Operation::create(json!({ "id": "p2", "type": "paragraph", "content": "" }))],
            None,
            None,
            ChangeInfo::new(),
        );
        doc.apply_change(&change).unwrap();
        history.record(change);

        // Someone else removed p2 behind the history's back
        doc.apply(&Operation::delete(json!({ "id": "p2", "type": "paragraph", "content": "" })))
            .unwrap();
        assert!(history.undo(&mut doc, &ids).is_err());
        assert!(history.can_undo());
    }
}

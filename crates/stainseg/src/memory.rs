//! In-memory [`Hierarchy`] for embedding and tests.

use crate::annotation::Annotation;
use crate::host::{CancelToken, Hierarchy, HierarchyError, ObjectId, RefineParams, RoiObject};

#[derive(Clone, Debug)]
struct Node {
    id: ObjectId,
    parent: Option<ObjectId>,
    annotation: Annotation,
}

/// Flat-stored annotation tree.
///
/// Besides storing objects it records the side effects a host would perform
/// (update events, selection, refine requests) so callers can inspect them.
#[derive(Clone, Debug, Default)]
pub struct MemoryHierarchy {
    nodes: Vec<Node>,
    next_id: u64,
    selected: Vec<ObjectId>,
    update_events: usize,
    refreshes: usize,
    refine_requests: Vec<RefineParams>,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level object directly (e.g. a hand-drawn ROI).
    pub fn add(&mut self, annotation: Annotation) -> ObjectId {
        self.push(annotation, None)
    }

    fn push(&mut self, annotation: Annotation, parent: Option<ObjectId>) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.nodes.push(Node {
            id,
            parent,
            annotation,
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Annotation> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| &n.annotation)
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.nodes.iter().find(|n| n.id == id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.nodes
            .iter()
            .filter(|n| n.parent == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// Objects with the given classification, in insertion order.
    pub fn with_classification(&self, classification: &str) -> Vec<ObjectId> {
        self.nodes
            .iter()
            .filter(|n| n.annotation.classification() == Some(classification))
            .map(|n| n.id)
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn selected(&self) -> &[ObjectId] {
        &self.selected
    }

    /// Number of children-changed events fired by insertions.
    pub fn update_events(&self) -> usize {
        self.update_events
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    pub fn refine_requests(&self) -> &[RefineParams] {
        &self.refine_requests
    }
}

impl Hierarchy for MemoryHierarchy {
    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn top_level_annotations(&self) -> Vec<RoiObject> {
        self.nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| RoiObject {
                id: n.id,
                classification: n.annotation.classification().map(str::to_string),
                geometry: n.annotation.geometry().clone(),
            })
            .collect()
    }

    fn insert(
        &mut self,
        annotation: Annotation,
        parent: Option<ObjectId>,
        fire_update: bool,
    ) -> Result<ObjectId, HierarchyError> {
        if let Some(p) = parent {
            if self.get(p).is_none() {
                return Err(HierarchyError::UnknownParent(p));
            }
        }
        let id = self.push(annotation, parent);
        if fire_update {
            self.update_events += 1;
        }
        Ok(id)
    }

    fn select_by_classification(&mut self, classification: &str) {
        self.selected = self.with_classification(classification);
    }

    fn refine_annotations(
        &mut self,
        params: &RefineParams,
        cancel: &CancelToken,
    ) -> Result<(), HierarchyError> {
        if cancel.is_cancelled() {
            return Err(HierarchyError::Cancelled);
        }
        self.refine_requests.push(*params);
        Ok(())
    }
}

/// Handle to a label cell in a function's label arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

impl LabelId {
    pub(crate) fn new(index: u32) -> Self {
        LabelId(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// A named jump target. Starts unresolved and is later bound to a byte
/// offset; rebinding the same cell overwrites the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    target: Option<u32>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    pub fn bind(&mut self, offset: u32) {
        self.target = Some(offset);
    }
}

/// Owns every label of one function. Scopes refer to labels by `LabelId`.
#[derive(Debug, Clone, Default)]
pub struct LabelArena {
    labels: Vec<Label>,
    // set once a label has been emitted as a branch operand
    referenced: Vec<bool>,
}

impl LabelArena {
    pub fn alloc(&mut self, name: &str) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(Label::new(name));
        self.referenced.push(false);
        id
    }

    /// `None` when `id` was not allocated by this arena.
    pub fn get(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: LabelId) -> Option<&mut Label> {
        self.labels.get_mut(id.0 as usize)
    }

    /// Returns false when `id` is not part of this arena.
    pub fn mark_referenced(&mut self, id: LabelId) -> bool {
        match self.referenced.get_mut(id.0 as usize) {
            Some(referenced) => {
                *referenced = true;
                true
            }
            None => false,
        }
    }

    /// Labels that some instruction jumps to but that were never bound.
    pub fn unbound_references(&self) -> impl Iterator<Item = &Label> {
        self.labels
            .iter()
            .zip(&self.referenced)
            .filter(|(label, referenced)| **referenced && !label.is_resolved())
            .map(|(label, _)| label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_starts_unresolved() {
        let label = Label::new("end");
        assert!(!label.is_resolved());
        assert_eq!(label.target(), None);
    }

    #[test]
    fn test_rebind_last_write_wins() {
        let mut label = Label::new("end");
        label.bind(4);
        label.bind(12);
        assert_eq!(label.target(), Some(12));
    }

    #[test]
    fn test_unbound_references() {
        let mut arena = LabelArena::default();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        let _c = arena.alloc("c");

        assert!(arena.mark_referenced(a));
        assert!(arena.mark_referenced(b));
        arena.get_mut(b).unwrap().bind(0);

        let names: Vec<&str> = arena.unbound_references().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_foreign_id_is_not_found() {
        let mut arena = LabelArena::default();
        arena.alloc("a");

        let stray = LabelId::new(5);
        assert!(arena.get(stray).is_none());
        assert!(arena.get_mut(stray).is_none());
        assert!(!arena.mark_referenced(stray));
        assert_eq!(arena.unbound_references().count(), 0);
    }
}

use crate::types::Dnt;

///
/// IdArray
///
/// In-memory identifier list with a 1-based cursor. Position 0 sits before
/// the first element and `len() + 1` after the last.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdArray {
    ids: Vec<Dnt>,
    position: usize,
}

impl IdArray {
    #[must_use]
    pub const fn new(ids: Vec<Dnt>) -> Self {
        Self { ids, position: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Identifier under the cursor, if the cursor is on an element.
    #[must_use]
    pub fn current(&self) -> Option<Dnt> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.ids.get(index))
            .copied()
    }

    /// Replace the contents and park the cursor before the first element.
    pub fn replace(&mut self, ids: Vec<Dnt>) {
        self.ids = ids;
        self.position = 0;
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.position = 0;
    }

    #[must_use]
    pub fn ids(&self) -> &[Dnt] {
        &self.ids
    }
}

//! In-memory object table with ordered secondary indexes.

use crate::{
    db::{
        index::ancestry::encode_chain,
        store::{
            ColumnRead, DirectoryCursor, FractionalPosition, Move, MoveResult, RangeLimit,
            RowColumns, SeekMode, SeekResult, TempColumn, TempTable,
        },
    },
    error::StoreError,
    types::{ColumnId, Dnt, IndexName, InstanceType},
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    ops::Bound,
    rc::Rc,
};

pub(crate) const ANCESTORS_INDEX: &str = "ancestors";
pub(crate) const PDNT_INDEX: &str = "pdnt";

///
/// ObjectRecord
///

#[derive(Clone, Debug)]
pub(crate) struct ObjectRecord {
    pub(crate) dnt: Dnt,
    pub(crate) pdnt: Dnt,
    pub(crate) nc: Dnt,
    pub(crate) ancestors: Vec<Dnt>,
    pub(crate) instance_type: InstanceType,
    pub(crate) is_object: bool,
    pub(crate) deleted: bool,
    pub(crate) attrs: BTreeMap<u32, Vec<u8>>,
}

impl ObjectRecord {
    fn column(&self, column: ColumnId) -> Option<Vec<u8>> {
        let flag = |set: bool| set.then(|| 1u32.to_le_bytes().to_vec());
        let dnt = |dnt: Dnt| (dnt != Dnt::INVALID).then(|| dnt.to_column_bytes().to_vec());

        match column {
            ColumnId::Dnt => dnt(self.dnt),
            ColumnId::Pdnt => dnt(self.pdnt),
            ColumnId::NcDnt => dnt(self.nc),
            ColumnId::Ancestors => Some(encode_chain(&self.ancestors)),
            ColumnId::InstanceType => self
                .is_object
                .then(|| self.instance_type.bits().to_le_bytes().to_vec()),
            ColumnId::IsDeleted => flag(self.deleted),
            ColumnId::ObjectFlag => flag(self.is_object),
            ColumnId::LinkTarget => None,
            ColumnId::Attribute(id) => self.attrs.get(&id).cloned(),
        }
    }
}

///
/// IndexEntry
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct IndexEntry {
    pub(crate) row: Dnt,
    pub(crate) link_target: Option<Dnt>,
}

///
/// MemoryStore
///

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub(crate) objects: BTreeMap<Dnt, ObjectRecord>,
    indexes: BTreeMap<String, BTreeMap<Vec<u8>, IndexEntry>>,
}

pub(crate) type SharedStore = Rc<RefCell<MemoryStore>>;

impl MemoryStore {
    pub(crate) fn insert(&mut self, record: ObjectRecord) {
        self.objects.insert(record.dnt, record);
        self.rebuild_standard_indexes();
    }

    /// Remove the object and every index entry that reaches it.
    pub(crate) fn remove(&mut self, dnt: Dnt) {
        self.objects.remove(&dnt);
        for entries in self.indexes.values_mut() {
            entries.retain(|_, entry| entry.row != dnt && entry.link_target != Some(dnt));
        }
        self.rebuild_standard_indexes();
    }

    pub(crate) fn set_deleted(&mut self, dnt: Dnt) {
        if let Some(record) = self.objects.get_mut(&dnt) {
            record.deleted = true;
        }
    }

    pub(crate) fn insert_index_entry(&mut self, index: &str, key: Vec<u8>, entry: IndexEntry) {
        self.indexes.entry(index.to_string()).or_default().insert(key, entry);
    }

    fn rebuild_standard_indexes(&mut self) {
        let mut ancestors = BTreeMap::new();
        let mut parents = BTreeMap::new();
        for record in self.objects.values() {
            let entry = IndexEntry {
                row: record.dnt,
                link_target: None,
            };
            ancestors.insert(encode_chain(&record.ancestors), entry);
            parents.insert(pdnt_key(record.pdnt, record.dnt), entry);
        }

        self.indexes.insert(ANCESTORS_INDEX.to_string(), ancestors);
        self.indexes.insert(PDNT_INDEX.to_string(), parents);
    }
}

pub(crate) fn pdnt_key(pdnt: Dnt, dnt: Dnt) -> Vec<u8> {
    let mut key = pdnt.to_key_bytes().to_vec();
    key.extend_from_slice(&dnt.to_key_bytes());
    key
}

fn no_current_record() -> StoreError {
    StoreError::engine(-1603, "no current record")
}

///
/// MemoryCursor
///

#[derive(Clone, Debug)]
pub(crate) struct MemoryCursor {
    store: SharedStore,
    index: Option<IndexName>,
    position: Option<Vec<u8>>,
    range: Option<(Vec<u8>, RangeLimit)>,
    row: Option<Dnt>,
}

impl MemoryCursor {
    pub(crate) fn new(store: SharedStore) -> Self {
        Self {
            store,
            index: None,
            position: None,
            range: None,
            row: None,
        }
    }

    fn with_entries<R>(
        &self,
        f: impl FnOnce(&BTreeMap<Vec<u8>, IndexEntry>) -> R,
    ) -> Result<R, StoreError> {
        let store = self.store.borrow();
        let name = self
            .index
            .as_ref()
            .ok_or_else(|| StoreError::engine(-1, "no current index"))?;
        let entries = store
            .indexes
            .get(name.as_str())
            .ok_or_else(|| StoreError::NotFound {
                key: name.to_string(),
            })?;

        Ok(f(entries))
    }

    fn land(&mut self, found: Option<(Vec<u8>, IndexEntry)>) -> bool {
        match found {
            Some((key, entry)) => {
                self.position = Some(key);
                self.row = Some(entry.row);
                true
            }
            None => false,
        }
    }

    fn outside_range(&self, key: &[u8]) -> bool {
        match &self.range {
            Some((limit, RangeLimit::Upper { inclusive })) => {
                if *inclusive {
                    key > limit.as_slice()
                } else {
                    key >= limit.as_slice()
                }
            }
            Some((limit, RangeLimit::Lower { inclusive })) => {
                if *inclusive {
                    key < limit.as_slice()
                } else {
                    key <= limit.as_slice()
                }
            }
            None => false,
        }
    }
}

impl RowColumns for MemoryCursor {
    fn retrieve_column(
        &mut self,
        column: ColumnId,
        buf: &mut [u8],
    ) -> Result<ColumnRead, StoreError> {
        let row = self.row.ok_or_else(no_current_record)?;
        let store = self.store.borrow();
        let record = store.objects.get(&row).ok_or_else(no_current_record)?;

        Ok(copy_value(record.column(column), buf))
    }
}

fn copy_value(value: Option<Vec<u8>>, buf: &mut [u8]) -> ColumnRead {
    let Some(value) = value else {
        return ColumnRead::Null;
    };
    if buf.len() < value.len() {
        return ColumnRead::Truncated {
            required: value.len(),
        };
    }
    buf[..value.len()].copy_from_slice(&value);

    ColumnRead::Value(value.len())
}

impl DirectoryCursor for MemoryCursor {
    fn set_index(&mut self, index: &IndexName) -> Result<(), StoreError> {
        self.index = Some(index.clone());
        self.position = None;
        self.range = None;
        Ok(())
    }

    fn current_index_name(&self) -> Option<&str> {
        self.index.as_ref().map(IndexName::as_str)
    }

    fn seek(&mut self, key: &[u8], mode: SeekMode) -> Result<SeekResult, StoreError> {
        self.range = None;
        let found = self.with_entries(|entries| {
            let hit = match mode {
                SeekMode::Eq => entries.get_key_value(key),
                SeekMode::Ge => entries.range(key.to_vec()..).next(),
                SeekMode::Le => entries.range(..=key.to_vec()).next_back(),
            };
            hit.map(|(k, e)| (k.clone(), *e))
        })?;

        let exact = found.as_ref().is_some_and(|(k, _)| k.as_slice() == key);
        if !self.land(found) {
            self.position = None;
            return Ok(SeekResult::NotFound);
        }

        Ok(if exact {
            SeekResult::Exact
        } else {
            SeekResult::Near
        })
    }

    fn set_index_range(
        &mut self,
        key: &[u8],
        limit: RangeLimit,
    ) -> Result<MoveResult, StoreError> {
        let current = self.position.clone().ok_or_else(no_current_record)?;
        self.range = Some((key.to_vec(), limit));
        if self.outside_range(&current) {
            self.range = None;
            return Ok(MoveResult::NoCurrentRecord);
        }

        Ok(MoveResult::Moved)
    }

    fn move_to(&mut self, step: Move) -> Result<MoveResult, StoreError> {
        let current = self.position.clone();
        let found = self.with_entries(|entries| {
            let hit = match (step, current) {
                (Move::First, _) => entries.iter().next(),
                (Move::Last, _) => entries.iter().next_back(),
                (Move::Next, Some(pos)) => entries
                    .range((Bound::Excluded(pos), Bound::Unbounded))
                    .next(),
                (Move::Prev, Some(pos)) => entries
                    .range((Bound::Unbounded, Bound::Excluded(pos)))
                    .next_back(),
                (Move::Next | Move::Prev, None) => None,
            };
            hit.map(|(k, e)| (k.clone(), *e))
        })?;

        if matches!(step, Move::First | Move::Last) {
            self.range = None;
        }
        if found.as_ref().is_some_and(|(key, _)| self.outside_range(key)) {
            return Ok(MoveResult::NoCurrentRecord);
        }
        if !self.land(found) {
            return Ok(MoveResult::NoCurrentRecord);
        }

        Ok(MoveResult::Moved)
    }

    fn retrieve_index_column(
        &mut self,
        column: ColumnId,
        buf: &mut [u8],
    ) -> Result<ColumnRead, StoreError> {
        let position = self.position.clone().ok_or_else(no_current_record)?;
        let entry = self.with_entries(|entries| entries.get(&position).copied())?;
        let entry = entry.ok_or_else(no_current_record)?;
        let value = match column {
            ColumnId::LinkTarget => entry.link_target.map(|dnt| dnt.to_column_bytes().to_vec()),
            _ => None,
        };

        Ok(copy_value(value, buf))
    }

    fn retrieve_key(&mut self) -> Result<Vec<u8>, StoreError> {
        self.position.clone().ok_or_else(no_current_record)
    }

    fn fractional_position(&mut self) -> Result<FractionalPosition, StoreError> {
        let position = self.position.clone().ok_or_else(no_current_record)?;
        let (rank, total) =
            self.with_entries(|entries| (entries.range(..position).count(), entries.len()))?;

        Ok(FractionalPosition::new(
            u32::try_from(rank).unwrap_or(u32::MAX),
            u32::try_from(total).unwrap_or(u32::MAX),
        ))
    }

    fn set_fractional_position(
        &mut self,
        position: FractionalPosition,
    ) -> Result<MoveResult, StoreError> {
        self.range = None;
        let found = self.with_entries(|entries| {
            let total = entries.len() as u64;
            if total == 0 {
                return None;
            }
            let rank = u64::from(position.numerator) * total
                / u64::from(position.denominator.max(1));
            let rank = usize::try_from(rank.min(total - 1)).unwrap_or(0);
            entries.iter().nth(rank).map(|(k, e)| (k.clone(), *e))
        })?;

        Ok(if self.land(found) {
            MoveResult::Moved
        } else {
            MoveResult::NoCurrentRecord
        })
    }

    fn bookmark(&mut self) -> Result<Vec<u8>, StoreError> {
        let row = self.row.ok_or_else(no_current_record)?;
        Ok(row.to_column_bytes().to_vec())
    }

    fn goto_bookmark(&mut self, bookmark: &[u8]) -> Result<bool, StoreError> {
        let Some(row) = Dnt::from_column_slice(bookmark) else {
            return Err(StoreError::Corrupt {
                message: "malformed bookmark".to_string(),
            });
        };
        self.range = None;
        if !self.store.borrow().objects.contains_key(&row) {
            return Ok(false);
        }

        self.row = Some(row);
        self.position = if self.index.is_some() {
            self.with_entries(|entries| {
                entries
                    .iter()
                    .find(|(_, entry)| entry.row == row)
                    .map(|(key, _)| key.clone())
            })?
        } else {
            None
        };

        Ok(true)
    }

    fn find_object(&mut self, dnt: Dnt) -> Result<bool, StoreError> {
        self.range = None;
        if !self.store.borrow().objects.contains_key(&dnt) {
            return Ok(false);
        }
        self.row = Some(dnt);

        Ok(true)
    }

    fn dup_cursor(&self) -> Result<Self, StoreError> {
        Ok(self.clone())
    }
}

///
/// MemoryTempTable
///

#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryTempTable {
    rows: Vec<Vec<u8>>,
    column: Option<TempColumn>,
    position: Option<usize>,
}

impl MemoryTempTable {
    pub(crate) fn sort_table(ids: &[Dnt]) -> Self {
        Self {
            rows: ids.iter().map(|dnt| dnt.to_column_bytes().to_vec()).collect(),
            column: Some(TempColumn::Dnt),
            position: None,
        }
    }

    /// Intersection rows carry object bookmarks.
    pub(crate) fn intersection(bookmarks: Vec<Vec<u8>>) -> Self {
        Self {
            rows: bookmarks,
            column: Some(TempColumn::Bookmark),
            position: None,
        }
    }

    pub(crate) fn without_columns(mut self) -> Self {
        self.column = None;
        self
    }
}

impl TempTable for MemoryTempTable {
    fn move_to(&mut self, step: Move) -> Result<MoveResult, StoreError> {
        let len = self.rows.len();
        let next = match (step, self.position) {
            (Move::First, _) => (len > 0).then_some(0),
            (Move::Last, _) => len.checked_sub(1),
            (Move::Next, Some(pos)) => (pos + 1 < len).then_some(pos + 1),
            (Move::Prev, Some(pos)) => pos.checked_sub(1),
            (Move::Next | Move::Prev, None) => None,
        };

        match next {
            Some(pos) => {
                self.position = Some(pos);
                Ok(MoveResult::Moved)
            }
            None => Ok(MoveResult::NoCurrentRecord),
        }
    }

    fn retrieve_column(&mut self, column: TempColumn) -> Result<Option<Vec<u8>>, StoreError> {
        let pos = self.position.ok_or_else(no_current_record)?;
        if self.column != Some(column) {
            return Ok(None);
        }

        Ok(self.rows.get(pos).cloned())
    }

    fn has_column(&self, column: TempColumn) -> bool {
        self.column == Some(column)
    }
}

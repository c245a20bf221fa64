//! Test fixtures: an in-memory directory, a manual clock, and simple
//! security and filter capabilities.

mod store;

pub(crate) use store::{
    ANCESTORS_INDEX, IndexEntry, MemoryCursor, MemoryStore, MemoryTempTable, ObjectRecord,
    PDNT_INDEX, SharedStore, pdnt_key,
};

use crate::{
    db::store::RowColumns,
    error::InternalError,
    traits::{
        Clock, FilterEvaluator, ObjectSecurity, ObjectSecurityInfo, SecurityDescriptor,
    },
    types::{Dnt, InstanceType, Tribool},
};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
    sync::Arc,
};

///
/// ManualClock
///
/// Advances by `step` on every read so time passes as the search works.
///

pub(crate) struct ManualClock {
    now: Cell<u64>,
    step: u64,
}

impl ManualClock {
    pub(crate) fn new(step: u64) -> Self {
        Self {
            now: Cell::new(1_000),
            step,
        }
    }
}

impl Clock for ManualClock {
    fn ticks(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        now
    }
}

///
/// DitBuilder
///
/// Builds a directory tree under an NC head at `Dnt::ROOT`.
///

pub(crate) struct DitBuilder {
    store: MemoryStore,
}

impl DitBuilder {
    pub(crate) const WRITABLE: u32 = InstanceType::WRITE;
    pub(crate) const NC_HEAD: u32 = InstanceType::WRITE | InstanceType::NC_HEAD;

    pub(crate) fn new() -> Self {
        let mut store = MemoryStore::default();
        store.insert(ObjectRecord {
            dnt: Dnt::ROOT,
            pdnt: Dnt::INVALID,
            nc: Dnt::INVALID,
            ancestors: vec![Dnt::ROOT],
            instance_type: InstanceType::from_bits(Self::NC_HEAD),
            is_object: true,
            deleted: false,
            attrs: BTreeMap::new(),
        });

        Self { store }
    }

    fn add(&mut self, dnt: u32, parent: u32, bits: u32, is_object: bool) -> &mut Self {
        let parent = self
            .store
            .objects
            .get(&Dnt(parent))
            .cloned()
            .unwrap_or_else(|| panic!("parent {parent} must exist before {dnt}"));
        let nc = if parent.instance_type.is_nc_head() {
            parent.dnt
        } else {
            parent.nc
        };
        let mut ancestors = parent.ancestors;
        ancestors.push(Dnt(dnt));

        self.store.insert(ObjectRecord {
            dnt: Dnt(dnt),
            pdnt: parent.dnt,
            nc,
            ancestors,
            instance_type: InstanceType::from_bits(bits),
            is_object,
            deleted: false,
            attrs: BTreeMap::new(),
        });
        self
    }

    pub(crate) fn object(&mut self, dnt: u32, parent: u32) -> &mut Self {
        self.add(dnt, parent, Self::WRITABLE, true)
    }

    pub(crate) fn nc_head(&mut self, dnt: u32, parent: u32) -> &mut Self {
        self.add(dnt, parent, Self::NC_HEAD, true)
    }

    /// Instantiated but not writable: a read-only replica.
    pub(crate) fn read_only(&mut self, dnt: u32, parent: u32) -> &mut Self {
        self.add(dnt, parent, 0, true)
    }

    pub(crate) fn phantom(&mut self, dnt: u32, parent: u32) -> &mut Self {
        self.add(dnt, parent, 0, false)
    }

    pub(crate) fn deleted(&mut self, dnt: u32) -> &mut Self {
        self.store.set_deleted(Dnt(dnt));
        self
    }

    pub(crate) fn attr(&mut self, dnt: u32, attribute: u32, value: &[u8]) -> &mut Self {
        if let Some(record) = self.store.objects.get_mut(&Dnt(dnt)) {
            record.attrs.insert(attribute, value.to_vec());
        }
        self
    }

    pub(crate) fn index_entry(&mut self, index: &str, key: Vec<u8>, row: u32, link: Option<u32>) -> &mut Self {
        self.store.insert_index_entry(
            index,
            key,
            IndexEntry {
                row: Dnt(row),
                link_target: link.map(Dnt),
            },
        );
        self
    }

    pub(crate) fn build(&mut self) -> SharedStore {
        Rc::new(RefCell::new(std::mem::take(&mut self.store)))
    }
}

impl Default for DitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

///
/// VisibleSet
///
/// Security capability that shows only the listed objects. Every third
/// object gets a session-owned descriptor, the rest share one.
///

pub(crate) struct VisibleSet {
    hidden: BTreeSet<Dnt>,
    lookups: Cell<usize>,
}

impl VisibleSet {
    pub(crate) fn hiding(hidden: &[u32]) -> Self {
        Self {
            hidden: hidden.iter().copied().map(Dnt).collect(),
            lookups: Cell::new(0),
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ObjectSecurity for VisibleSet {
    fn object_security_info(&self, dnt: Dnt) -> Result<Option<ObjectSecurityInfo>, InternalError> {
        self.lookups.set(self.lookups.get() + 1);
        let bytes = dnt.to_column_bytes().to_vec();
        let descriptor = if dnt.get() % 3 == 0 {
            SecurityDescriptor::Owned(bytes)
        } else {
            SecurityDescriptor::Shared(Arc::from(bytes))
        };

        Ok(Some(ObjectSecurityInfo {
            descriptor,
            class_id: 0,
            dn: format!("CN={}", dnt.get()),
            instance_type: InstanceType::from_bits(InstanceType::WRITE),
        }))
    }

    fn evaluate_filter_security(&self, descriptor: &[u8], _class_id: u32, _dn: &str) -> bool {
        Dnt::from_column_slice(descriptor).is_some_and(|dnt| !self.hidden.contains(&dnt))
    }
}

///
/// RejectSet
///
/// Filter that is false for the listed objects and true otherwise.
///

pub(crate) struct RejectSet(pub(crate) BTreeSet<Dnt>);

impl FilterEvaluator for RejectSet {
    fn evaluate(&self, row: &mut dyn RowColumns) -> Result<Tribool, InternalError> {
        let dnt = crate::db::store::read_dnt(row, crate::types::ColumnId::Dnt)?;
        Ok(Tribool::from_bool(dnt.is_none_or(|dnt| !self.0.contains(&dnt))))
    }
}

use crate::{
    config::SearchConfig,
    db::{
        array::IdArray,
        asq::AsqState,
        dedup::DuplicateSuppressor,
        index::{IndexChain, IndexStrategy, IndexType},
        scope::SearchScope,
        store::TempTable,
        vlv::VlvState,
    },
};

///
/// AccessPlan
///
/// The optimizer's choice of where candidates come from.
///

pub enum AccessPlan {
    /// Union of index ranges walked front to back.
    IndexRanges(Vec<IndexStrategy>),
    /// Sorted temp table of identifiers.
    SortTable(Box<dyn TempTable>),
    /// Materialized identifier list.
    IdArray(IdArray),
    /// Attribute-scoped query over one object's link values.
    Asq(AsqState),
    /// The optimizer proved the result empty.
    Empty,
}

///
/// PendingStep
///
/// Work the next positioning step owes before moving the cursor.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum PendingStep {
    #[default]
    None,
    /// The cursor already sits on the next row to inspect.
    Current,
    /// The active range ran out during repositioning.
    Exhausted,
}

///
/// SearchKey
///
/// All positioning state of one search session.
///

pub struct SearchKey {
    pub scope: SearchScope,
    pub index_type: IndexType,
    pub search_in_progress: bool,
    pub on_candidate: bool,
    pub change_direction: bool,
    pub(crate) pending: PendingStep,

    pub chain: IndexChain,
    pub sort_table: Option<Box<dyn TempTable>>,
    pub array: IdArray,
    pub dups: DuplicateSuppressor,
    pub vlv: Option<VlvState>,
    pub asq: Option<AsqState>,
}

impl SearchKey {
    #[must_use]
    pub fn new(scope: SearchScope, plan: AccessPlan, config: &SearchConfig) -> Self {
        let mut key = Self {
            scope,
            index_type: IndexType::Unset,
            search_in_progress: false,
            on_candidate: false,
            change_direction: false,
            pending: PendingStep::None,
            chain: IndexChain::default(),
            sort_table: None,
            array: IdArray::default(),
            dups: DuplicateSuppressor::never(),
            vlv: None,
            asq: None,
        };

        match plan {
            AccessPlan::IndexRanges(ranges) => {
                key.chain = IndexChain::new(ranges);
                if key.chain.needs_duplicate_detection() {
                    key.dups = DuplicateSuppressor::fixed_block(config.dup_block_capacity);
                }
            }
            AccessPlan::SortTable(table) => {
                key.index_type = IndexType::TempTableOnDisk;
                key.sort_table = Some(table);
            }
            AccessPlan::IdArray(array) => {
                key.index_type = IndexType::TempTableMemoryArray;
                key.array = array;
            }
            AccessPlan::Asq(mut asq) => {
                asq.cap_page_size(config.asq_page_size);
                key.index_type = IndexType::TempTableMemoryArray;
                key.asq = Some(asq);
            }
            AccessPlan::Empty => key.index_type = IndexType::Invalid,
        }

        key
    }

    #[must_use]
    pub const fn with_change_direction(mut self, change_direction: bool) -> Self {
        self.change_direction = change_direction;
        self
    }

    #[must_use]
    pub fn with_vlv(mut self, vlv: VlvState) -> Self {
        self.vlv = Some(vlv);
        self
    }

    #[must_use]
    pub const fn is_asq(&self) -> bool {
        self.asq.is_some()
    }

    /// Strategies fed by the index chain.
    #[must_use]
    pub(crate) const fn is_chain_strategy(&self) -> bool {
        matches!(
            self.index_type,
            IndexType::Unset
                | IndexType::Generic
                | IndexType::AncestorsIndex
                | IndexType::TupleIndex
                | IndexType::Intersection
        )
    }
}

//! Module: db::scope
//! Responsibility: decide whether a positioned row lies inside the search's
//! naming context and DIT scope.
//! Does not own: skipping past rejected subtrees (the positioner does that).
//!
//! The whole-subtree check trusts the stored ancestors value. After an
//! ancestor is moved that value can be stale until background ancestry
//! repair reaches it; results during that window follow the stored value.

use crate::{
    db::{
        asq::{ReferralCause, StickyReferral},
        index::AncestorBlob,
        store::{RowColumns, read_dnt},
    },
    error::InternalError,
    types::{ColumnId, Dnt, InstanceType},
};

///
/// SearchType
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SearchType {
    BaseOnly,
    ImmediateChildren,
    #[default]
    WholeSubtree,
}

///
/// SearchScope
///
/// Scope descriptor a search session is created from.
///

#[derive(Clone, Debug)]
pub struct SearchScope {
    pub search_type: SearchType,
    pub root: Dnt,
    pub root_parent: Dnt,
    pub root_nc: Dnt,

    /// Results stay inside the root's naming context (not a GC search).
    pub one_nc_only: bool,

    /// Caller-computed hint: ancestry is consistent and the root is an NC
    /// head, so every in-NC row is inside the subtree.
    pub root_is_consistent_nc_head: bool,

    /// Naming contexts a global-catalog search must not return, sorted.
    pub do_not_search_ncs: Vec<Dnt>,

    /// Return tombstones too.
    pub include_deleted: bool,

    /// Global catalog holds only the partial attribute set for read-only NCs.
    pub gc_partial_attributes: bool,
}

impl SearchScope {
    #[must_use]
    pub fn new(search_type: SearchType, root: Dnt, root_parent: Dnt, root_nc: Dnt) -> Self {
        Self {
            search_type,
            root,
            root_parent,
            root_nc,
            one_nc_only: true,
            root_is_consistent_nc_head: false,
            do_not_search_ncs: Vec::new(),
            include_deleted: false,
            gc_partial_attributes: false,
        }
    }

    /// Cross-NC global-catalog search that skips `excluded` naming contexts.
    #[must_use]
    pub fn global_catalog(mut self, mut excluded: Vec<Dnt>) -> Self {
        excluded.sort_unstable();
        excluded.dedup();
        self.one_nc_only = false;
        self.do_not_search_ncs = excluded;
        self
    }
}

///
/// LocationMode
///
/// Request-level facts that relax the location check.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LocationMode {
    pub asq_active: bool,
    /// VLV over a container index that already guarantees containment.
    pub container_index: bool,
}

///
/// ScopeValidator
///

pub struct ScopeValidator<'a> {
    scope: &'a SearchScope,
}

impl<'a> ScopeValidator<'a> {
    #[must_use]
    pub const fn new(scope: &'a SearchScope) -> Self {
        Self { scope }
    }

    /// Naming-context membership of one object.
    ///
    /// `instance_type` is `None` for phantoms. Under an active ASQ a hit in a
    /// foreign naming context is kept but raises a multi-DSA referral.
    pub fn is_in_correct_nc(
        &self,
        dnt: Dnt,
        instance_type: Option<InstanceType>,
        nc_dnt: Option<Dnt>,
        asq_active: bool,
        referral: &mut StickyReferral,
    ) -> bool {
        let Some(instance_type) = instance_type else {
            return false;
        };
        if instance_type.is_uninstantiated() {
            return false;
        }

        if !self.scope.one_nc_only {
            let nc = if instance_type.is_nc_head() {
                dnt
            } else {
                nc_dnt.unwrap_or(Dnt::INVALID)
            };

            return self.scope.do_not_search_ncs.binary_search(&nc).is_err();
        }

        let in_nc = if instance_type.is_nc_head() {
            dnt == self.scope.root
        } else {
            nc_dnt == Some(self.scope.root_nc)
        };
        if in_nc {
            return true;
        }
        if asq_active {
            referral.raise(ReferralCause::AffectsMultipleDsas);
            return true;
        }

        false
    }

    /// DIT-location membership of the current object row.
    pub fn is_in_correct_location<R>(
        &self,
        row: &mut R,
        blob: &mut AncestorBlob,
        mode: LocationMode,
    ) -> Result<bool, InternalError>
    where
        R: RowColumns + ?Sized,
    {
        match self.scope.search_type {
            SearchType::BaseOnly => {
                if mode.asq_active {
                    return Ok(true);
                }
                Ok(read_dnt(row, ColumnId::Dnt)? == Some(self.scope.root))
            }
            SearchType::ImmediateChildren => {
                if mode.container_index {
                    return Ok(true);
                }
                Ok(read_dnt(row, ColumnId::Pdnt)? == Some(self.scope.root))
            }
            SearchType::WholeSubtree => {
                if self.scope.root == Dnt::ROOT || self.scope.root_is_consistent_nc_head {
                    return Ok(true);
                }
                blob.fetch(row)?;

                Ok(blob.contains(self.scope.root))
            }
        }
    }
}

///
/// TESTS
///

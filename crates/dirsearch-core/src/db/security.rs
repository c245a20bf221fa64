//! Module: db::security
//! Responsibility: per-candidate security and filter evaluation.
//! Does not own: access-check policy or filter semantics; both are injected
//! capabilities.
//! Boundary: the session holds at most one security descriptor at a time.

use crate::{
    db::store::RowColumns,
    error::InternalError,
    traits::{FilterEvaluator, ObjectSecurity, SecurityDescriptor},
    types::Dnt,
};

///
/// SecuritySlot
///
/// The one descriptor a session may hold: the one belonging to the object it
/// last returned. Replacing or releasing it drops the previous value.
///

#[derive(Debug, Default)]
pub struct SecuritySlot {
    held: Option<SecurityDescriptor>,
}

impl SecuritySlot {
    pub fn release(&mut self) {
        if let Some(descriptor) = self.held.take() {
            tracing::trace!(shared = descriptor.is_global_ref(), "released security descriptor");
        }
    }

    fn hold(&mut self, descriptor: SecurityDescriptor) {
        self.release();
        self.held = Some(descriptor);
    }

    #[must_use]
    pub const fn descriptor(&self) -> Option<&SecurityDescriptor> {
        self.held.as_ref()
    }
}

///
/// FilterSecurityGate
///

#[derive(Clone, Copy)]
pub struct FilterSecurityGate<'a> {
    security: Option<&'a dyn ObjectSecurity>,
    filter: Option<&'a dyn FilterEvaluator>,
}

impl<'a> FilterSecurityGate<'a> {
    #[must_use]
    pub const fn new(
        security: Option<&'a dyn ObjectSecurity>,
        filter: Option<&'a dyn FilterEvaluator>,
    ) -> Self {
        Self { security, filter }
    }

    /// Whether the object under `row` may be returned.
    ///
    /// On acceptance the object's descriptor stays in `slot`; on rejection
    /// the slot is left empty.
    pub fn evaluate(
        &self,
        dnt: Dnt,
        row: &mut dyn RowColumns,
        slot: &mut SecuritySlot,
    ) -> Result<bool, InternalError> {
        if let Some(security) = self.security {
            slot.release();

            let Some(info) = security.object_security_info(dnt)? else {
                tracing::trace!(%dnt, "object has no security descriptor");
                return Ok(false);
            };
            let visible = security.evaluate_filter_security(
                info.descriptor.as_bytes(),
                info.class_id,
                &info.dn,
            );
            if !visible {
                return Ok(false);
            }
            slot.hold(info.descriptor);
        }

        if let Some(filter) = self.filter
            && !filter.evaluate(row)?.is_true()
        {
            slot.release();
            return Ok(false);
        }

        Ok(true)
    }
}

///
/// TESTS
///

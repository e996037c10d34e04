//! Party lookup: existence check plus display name.

use crate::{
    error::{Entity, LedgerError, LedgerResult},
    model::{Party, PartyRole},
    store::ReadAccess,
    types::PartyId,
};

pub trait IdentityProvider {
    /// Resolve `id` as a party holding `role`. A party registered under a
    /// different role is reported as not found.
    fn resolve(&self, role: PartyRole, id: PartyId) -> LedgerResult<Party>;

    fn display_name(&self, role: PartyRole, id: PartyId) -> LedgerResult<String> {
        Ok(self.resolve(role, id)?.display_name)
    }
}

impl<T: ReadAccess> IdentityProvider for T {
    fn resolve(&self, role: PartyRole, id: PartyId) -> LedgerResult<Party> {
        match self.find_party(id)? {
            Some(party) if party.role == role => Ok(party),
            _ => Err(LedgerError::NotFound {
                entity: Entity::Party(role),
                id,
            }),
        }
    }
}

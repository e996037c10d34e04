use super::uuid_at;
use crate::{error::LedgerResult, model::{Party, PartyRole}, types::PartyId};
use rusqlite::{params, Connection, OptionalExtension};

pub(super) fn insert(conn: &Connection, party: &Party) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO party (party_id, role, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            party.party_id.to_string(),
            party.role.as_str(),
            &party.display_name,
            party.created_at,
        ],
    )?;
    Ok(())
}

pub(super) fn find(conn: &Connection, party_id: PartyId) -> LedgerResult<Option<Party>> {
    let party = conn
        .query_row(
            "SELECT party_id, role, display_name, created_at FROM party WHERE party_id = ?1",
            params![party_id.to_string()],
            |row| {
                let role: String = row.get(1)?;
                Ok(Party {
                    party_id:     uuid_at(row, 0)?,
                    role:         role
                        .parse::<PartyRole>()
                        .map_err(|e| super::conversion_failure(1, e))?,
                    display_name: row.get(2)?,
                    created_at:   row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(party)
}

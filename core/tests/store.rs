mod common;

use chrono::Utc;
use common::TempDb;
use loan_ledger_core::{
    model::{Party, PartyRole},
    store::{LedgerStore, ReadAccess, WriteAccess},
};
use uuid::Uuid;

fn party(role: PartyRole, name: &str) -> Party {
    Party {
        party_id:     Uuid::new_v4(),
        role,
        display_name: name.into(),
        created_at:   Utc::now(),
    }
}

#[test]
fn migrate_is_idempotent() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.migrate().unwrap();
}

#[test]
fn dropped_write_handle_rolls_back() {
    let mut store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p = party(PartyRole::Investor, "Andi");

    {
        let tx = store.write().unwrap();
        tx.insert_party(&p).unwrap();
        assert!(tx.find_party(p.party_id).unwrap().is_some());
    }
    assert!(store.read().unwrap().find_party(p.party_id).unwrap().is_none());

    let tx = store.write().unwrap();
    tx.insert_party(&p).unwrap();
    tx.commit().unwrap();
    let found = store.read().unwrap().find_party(p.party_id).unwrap().expect("committed party");
    assert_eq!(found.role, PartyRole::Investor);
    assert_eq!(found.display_name, "Andi");
}

#[test]
fn second_connection_sees_committed_rows() {
    let db = TempDb::new("store-reopen");
    let mut first = LedgerStore::open(db.as_str()).unwrap();
    first.migrate().unwrap();
    let p = party(PartyRole::Borrower, "Siti");
    let tx = first.write().unwrap();
    tx.insert_party(&p).unwrap();
    tx.commit().unwrap();

    let mut second = first.reopen().unwrap();
    assert_eq!(second.path(), Some(db.as_str()));
    assert!(second.read().unwrap().find_party(p.party_id).unwrap().is_some());
}

#[test]
fn unknown_ids_read_as_none() {
    let mut store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let tx = store.read().unwrap();
    assert!(tx.find_loan(Uuid::new_v4()).unwrap().is_none());
    assert!(tx.find_investment(Uuid::new_v4()).unwrap().is_none());
    assert!(tx.investments_for_loan(Uuid::new_v4()).unwrap().is_empty());
}

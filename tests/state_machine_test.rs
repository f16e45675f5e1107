use chrono::{Duration, Utc};

use rolebond::{RelationBook, RoleLean, Whitelist};

const LEANS: [RoleLean; 8] = [
    RoleLean::None,
    RoleLean::Owner,
    RoleLean::Mistress,
    RoleLean::Master,
    RoleLean::Submissive,
    RoleLean::Pet,
    RoleLean::Slave,
    RoleLean::AbsoluteSlave,
];

fn book() -> RelationBook {
    RelationBook::new(Whitelist::from_names(["Kaede Ito"]).expect("unique names"))
}

/// Drive the single record into a state where every field is set.
fn committed_book(yours: RoleLean, theirs: RoleLean) -> RelationBook {
    let mut book = book();
    book.receive_request(0, theirs).unwrap();
    book.accept_pending(0, Utc::now()).unwrap();
    book.propose(0, yours).unwrap();
    book.receive_accept(0, yours, Utc::now()).unwrap();
    book.propose(0, RoleLean::Pet).unwrap();
    book.receive_request(0, RoleLean::Slave).unwrap();
    book
}

#[test]
fn test_request_mutates_no_status() {
    for lean in RoleLean::ALL {
        let mut book = committed_book(RoleLean::Owner, RoleLean::Pet);
        let before = book.record(0).unwrap().clone();

        book.receive_request(0, lean).unwrap();

        let after = book.record(0).unwrap();
        assert_eq!(after.pending_request_from_player, lean);
        assert_eq!(after.your_status_to_them, before.your_status_to_them);
        assert_eq!(after.their_status_to_you, before.their_status_to_you);
        assert_eq!(after.pending_request_from_you, before.pending_request_from_you);
        assert_eq!(
            after.commitment_established_at,
            before.commitment_established_at
        );
    }
}

#[test]
fn test_accept_sets_status_and_clears_pending() {
    for pending in LEANS {
        for lean in LEANS {
            let mut book = book();
            if !pending.is_none() {
                book.propose(0, pending).unwrap();
            }
            book.receive_accept(0, lean, Utc::now()).unwrap();

            let record = book.record(0).unwrap();
            assert_eq!(record.your_status_to_them, lean);
            assert_eq!(record.pending_request_from_you, RoleLean::None);
        }
    }
}

#[test]
fn test_decline_keeps_statuses() {
    let mut book = committed_book(RoleLean::Mistress, RoleLean::Submissive);
    let before = book.record(0).unwrap().clone();

    book.receive_decline(0).unwrap();

    let after = book.record(0).unwrap();
    assert_eq!(after.pending_request_from_you, RoleLean::None);
    assert_eq!(after.your_status_to_them, before.your_status_to_them);
    assert_eq!(after.their_status_to_you, before.their_status_to_you);
    assert_eq!(
        after.pending_request_from_player,
        before.pending_request_from_player
    );
}

#[test]
fn test_remove_from_any_state() {
    let mut books = vec![book(), committed_book(RoleLean::Owner, RoleLean::Pet)];
    let mut partial = book();
    partial.receive_request(0, RoleLean::Master).unwrap();
    books.push(partial);

    for mut book in books {
        book.remove_relation(0).unwrap();
        let record = book.record(0).unwrap();
        assert_eq!(record.your_status_to_them, RoleLean::None);
        assert_eq!(record.their_status_to_you, RoleLean::None);
        assert_eq!(record.pending_request_from_you, RoleLean::None);
        assert_eq!(record.pending_request_from_player, RoleLean::None);
        assert!(record.commitment_established_at.is_none());
    }
}

#[test]
fn test_tier_adjustment_keeps_commitment_timestamp() {
    let mut book = committed_book(RoleLean::Pet, RoleLean::Owner);
    let since = book
        .record(0)
        .unwrap()
        .commitment_established_at
        .expect("committed");

    let later = since + Duration::hours(5);
    let outcome = book.receive_accept(0, RoleLean::Master, later).unwrap();

    assert!(outcome.commitment_started.is_none());
    let record = book.record(0).unwrap();
    assert_eq!(record.your_status_to_them, RoleLean::Master);
    assert_eq!(record.commitment_established_at, Some(since));
}

#[test]
fn test_category_change_restarts_commitment() {
    let mut book = committed_book(RoleLean::Pet, RoleLean::Owner);
    let later = Utc::now() + Duration::days(2);

    // Slave against their Owner status: different categories.
    let outcome = book.receive_accept(0, RoleLean::Slave, later).unwrap();
    assert_eq!(outcome.commitment_started, Some(later));
    assert_eq!(
        book.record(0).unwrap().commitment_established_at,
        Some(later)
    );
}

#[test]
fn test_commitment_set_once_their_status_appears() {
    let mut book = book();
    let now = Utc::now();

    // Their status is still None: nothing to commit to yet.
    book.receive_accept(0, RoleLean::Master, now).unwrap();
    assert!(book.record(0).unwrap().commitment_established_at.is_none());

    // Their status becomes non-None independently, then a fresh accept lands.
    book.receive_request(0, RoleLean::Pet).unwrap();
    book.accept_pending(0, now).unwrap();
    assert_eq!(book.record(0).unwrap().commitment_established_at, Some(now));

    let later = now + Duration::minutes(1);
    book.receive_accept(0, RoleLean::Master, later).unwrap();
    assert_eq!(book.record(0).unwrap().commitment_established_at, Some(later));
}

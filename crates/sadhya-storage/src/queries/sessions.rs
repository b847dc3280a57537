// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session reads and the atomic transition commit.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use sadhya_core::{CommitOutcome, MessageId, OrderId, SadhyaError, Session, TransitionCommit};

use super::{decode_enum, decode_ts, encode_ts, from_i64, from_json, to_i64, to_json};
use crate::database::{Database, map_tr_err};
use crate::queries::{orders, outbox, tokens};

const SESSION_COLUMNS: &str =
    "phone, stage, draft, order_id, version, created_at, last_activity_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let stage: String = row.get(1)?;
    let draft: String = row.get(2)?;
    Ok(Session {
        phone: row.get(0)?,
        stage: decode_enum(1, &stage)?,
        draft: from_json(2, &draft)?,
        order_id: row.get::<_, Option<String>>(3)?.map(OrderId),
        version: from_i64(4, row.get(4)?)?,
        created_at: decode_ts(5, row.get(5)?)?,
        last_activity_at: decode_ts(6, row.get(6)?)?,
    })
}

/// Writes `session` with a compare-and-set on its stored version.
///
/// `expected_version = None` inserts a new row and fails if one exists.
/// Returns whether the row was written.
pub(crate) fn write_session(
    conn: &Connection,
    session: &Session,
    expected_version: Option<u64>,
) -> rusqlite::Result<bool> {
    let draft = to_json(&session.draft)?;
    let order_id = session.order_id.as_ref().map(|o| o.0.clone());
    let changed = match expected_version {
        None => conn.execute(
            "INSERT INTO sessions (phone, stage, draft, order_id, version, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(phone) DO NOTHING",
            params![
                session.phone,
                session.stage.to_string(),
                draft,
                order_id,
                to_i64(session.version)?,
                encode_ts(session.created_at),
                encode_ts(session.last_activity_at),
            ],
        )?,
        Some(expected) => conn.execute(
            "UPDATE sessions
             SET stage = ?2, draft = ?3, order_id = ?4, version = ?5,
                 created_at = ?6, last_activity_at = ?7
             WHERE phone = ?1 AND version = ?8",
            params![
                session.phone,
                session.stage.to_string(),
                draft,
                order_id,
                to_i64(session.version)?,
                encode_ts(session.created_at),
                encode_ts(session.last_activity_at),
                to_i64(expected)?,
            ],
        )?,
    };
    Ok(changed == 1)
}

/// Get a session by phone number.
pub async fn get_session(db: &Database, phone: &str) -> Result<Option<Session>, SadhyaError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE phone = ?1"),
                params![phone],
                session_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Sessions whose last activity is strictly older than `cutoff`.
pub async fn list_idle_since(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Session>, SadhyaError> {
    let cutoff = encode_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE last_activity_at < ?1 ORDER BY last_activity_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], session_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session if it still has `expected_version`.
pub async fn delete_session(
    db: &Database,
    phone: &str,
    expected_version: u64,
) -> Result<bool, SadhyaError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM sessions WHERE phone = ?1 AND version = ?2",
                params![phone, to_i64(expected_version)?],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether an inbound message id has been recorded.
pub async fn is_event_processed(
    db: &Database,
    message_id: &MessageId,
) -> Result<bool, SadhyaError> {
    let message_id = message_id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT 1 FROM processed_events WHERE message_id = ?1",
                params![message_id],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
        .await
        .map_err(map_tr_err)
}

/// Forget event receipts older than `cutoff`.
pub async fn prune_processed_events(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<u64, SadhyaError> {
    let cutoff = encode_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM processed_events WHERE processed_at < ?1",
                params![cutoff],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a transition in one transaction.
///
/// Checks the event receipt first so a redelivered message is reported as a
/// duplicate even if the session has moved on since.
pub async fn commit_transition(
    db: &Database,
    commit: TransitionCommit,
) -> Result<CommitOutcome, SadhyaError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            if let Some(event) = &commit.event {
                let seen = tx
                    .query_row(
                        "SELECT 1 FROM processed_events WHERE message_id = ?1",
                        params![event.message_id.0],
                        |_| Ok(()),
                    )
                    .optional()?;
                if seen.is_some() {
                    return Ok(CommitOutcome::DuplicateEvent);
                }
            }

            if !write_session(&tx, &commit.session, commit.expected_version)? {
                return Ok(CommitOutcome::VersionConflict);
            }

            if let Some(event) = &commit.event {
                tx.execute(
                    "INSERT INTO processed_events (message_id, phone, stage, processed_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        event.message_id.0,
                        event.phone,
                        event.stage.to_string(),
                        encode_ts(event.processed_at),
                    ],
                )?;
            }

            if let Some(order) = &commit.order {
                orders::insert_order(&tx, order)?;
            }
            for token in &commit.tokens {
                tokens::insert_token(&tx, token)?;
            }
            outbox::insert_jobs(&tx, &commit.jobs, commit.session.last_activity_at)?;

            tx.commit()?;
            Ok(CommitOutcome::Committed)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sadhya_core::{EventReceipt, OutboundIntent, OutboxJob, Stage};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 10, minute, 0).unwrap()
    }

    fn commit_for(session: Session, expected: Option<u64>, wamid: &str) -> TransitionCommit {
        TransitionCommit {
            event: Some(EventReceipt {
                message_id: MessageId(wamid.to_string()),
                phone: session.phone.clone(),
                stage: Stage::AwaitingStart,
                processed_at: session.last_activity_at,
            }),
            session,
            expected_version: expected,
            order: None,
            tokens: vec![],
            jobs: vec![OutboxJob::send(OutboundIntent::text("919800000001", "hi"))],
        }
    }

    #[tokio::test]
    async fn create_then_update_with_version_check() {
        let (db, _dir) = setup_db().await;

        let mut session = Session::new("919800000001", at(0));
        session.stage = Stage::AwaitingDate;
        session.version = 1;
        let outcome = commit_transition(&db, commit_for(session.clone(), None, "wamid.1"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let stored = get_session(&db, "919800000001").await.unwrap().unwrap();
        assert_eq!(stored, session);

        let mut next = stored.clone();
        next.stage = Stage::AwaitingJunction;
        next.version = 2;
        next.last_activity_at = at(1);
        let outcome = commit_transition(&db, commit_for(next.clone(), Some(1), "wamid.2"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        // A writer still holding version 1 loses.
        let mut stale = stored;
        stale.stage = Stage::AwaitingMenu;
        stale.version = 2;
        let outcome = commit_transition(&db, commit_for(stale, Some(1), "wamid.3"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::VersionConflict);

        let stored = get_session(&db, "919800000001").await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::AwaitingJunction);
        assert!(!is_event_processed(&db, &MessageId("wamid.3".into())).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_event_writes_nothing() {
        let (db, _dir) = setup_db().await;

        let mut session = Session::new("919800000002", at(0));
        session.stage = Stage::AwaitingDate;
        session.version = 1;
        commit_transition(&db, commit_for(session.clone(), None, "wamid.dup"))
            .await
            .unwrap();

        let mut replay = session.clone();
        replay.version = 2;
        replay.stage = Stage::AwaitingJunction;
        let outcome = commit_transition(&db, commit_for(replay, Some(1), "wamid.dup"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::DuplicateEvent);

        let stored = get_session(&db, "919800000002").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        let jobs: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(jobs, 1, "replayed event must not enqueue again");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn inserting_existing_session_conflicts() {
        let (db, _dir) = setup_db().await;

        let mut session = Session::new("919800000003", at(0));
        session.version = 1;
        commit_transition(&db, commit_for(session.clone(), None, "wamid.a"))
            .await
            .unwrap();
        let outcome = commit_transition(&db, commit_for(session, None, "wamid.b"))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::VersionConflict);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn idle_listing_and_versioned_delete() {
        let (db, _dir) = setup_db().await;

        let mut old = Session::new("919800000004", at(0));
        old.version = 1;
        let mut fresh = Session::new("919800000005", at(30));
        fresh.version = 1;
        commit_transition(&db, commit_for(old, None, "wamid.old"))
            .await
            .unwrap();
        commit_transition(&db, commit_for(fresh, None, "wamid.fresh"))
            .await
            .unwrap();

        let idle = list_idle_since(&db, at(10)).await.unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].phone, "919800000004");

        assert!(!delete_session(&db, "919800000004", 7).await.unwrap());
        assert!(delete_session(&db, "919800000004", 1).await.unwrap());
        assert!(get_session(&db, "919800000004").await.unwrap().is_none());

        assert_eq!(prune_processed_events(&db, at(10)).await.unwrap(), 1);
        db.close().await.unwrap();
    }
}

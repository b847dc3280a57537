// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional outbox for crash-safe side effects.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sadhya_core::{OutboxEntry, OutboxJob, OutboxStatus, SadhyaError};

use super::{decode_enum, decode_ts, encode_ts, from_json, to_json};
use crate::database::{Database, map_tr_err};

pub(crate) fn insert_jobs(
    conn: &Connection,
    jobs: &[OutboxJob],
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    if jobs.is_empty() {
        return Ok(());
    }
    let now = encode_ts(now);
    let mut stmt = conn.prepare_cached(
        "INSERT INTO outbox (kind, payload, status, attempts, available_at, created_at, updated_at)
         VALUES (?1, ?2, 'pending', 0, ?3, ?3, ?3)",
    )?;
    for job in jobs {
        stmt.execute(params![job.label(), to_json(job)?, now])?;
    }
    Ok(())
}

/// Enqueue jobs outside a transition, due immediately.
pub async fn enqueue_jobs(
    db: &Database,
    jobs: Vec<OutboxJob>,
    now: DateTime<Utc>,
) -> Result<(), SadhyaError> {
    db.connection()
        .call(move |conn| insert_jobs(conn, &jobs, now))
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest due job.
///
/// Atomically selects it, counts the attempt, and leases it until
/// `lease_until` so a crashed worker's job becomes due again.
pub async fn dequeue_job(
    db: &Database,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<Option<OutboxEntry>, SadhyaError> {
    let now = encode_ts(now);
    let lease = encode_ts(lease_until);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let row = tx
                .query_row(
                    "SELECT id, payload, attempts, last_error, created_at
                     FROM outbox
                     WHERE status IN ('pending', 'processing') AND available_at <= ?1
                     ORDER BY available_at ASC, id ASC
                     LIMIT 1",
                    params![now],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u32>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((id, payload, attempts, last_error, created_at)) = row else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE outbox SET status = 'processing', attempts = attempts + 1,
                 available_at = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![id, lease, now],
            )?;
            tx.commit()?;

            Ok(Some(OutboxEntry {
                id,
                job: from_json(1, &payload)?,
                status: OutboxStatus::Processing,
                attempts: attempts + 1,
                available_at: decode_ts(0, lease)?,
                last_error,
                created_at: decode_ts(4, created_at)?,
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful delivery of a job.
pub async fn ack_job(db: &Database, id: i64) -> Result<(), SadhyaError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE outbox SET status = 'completed', last_error = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// With `retry_at` the job returns to "pending" and becomes due at that
/// instant; without it the job is parked as "failed".
pub async fn fail_job(
    db: &Database,
    id: i64,
    error: &str,
    retry_at: Option<DateTime<Utc>>,
) -> Result<(), SadhyaError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            match retry_at {
                Some(at) => conn.execute(
                    "UPDATE outbox SET status = 'pending', available_at = ?2, last_error = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, encode_ts(at), error],
                )?,
                None => conn.execute(
                    "UPDATE outbox SET status = 'failed', last_error = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, error],
                )?,
            };
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete completed and parked jobs created before `before`.
pub async fn prune_finished(db: &Database, before: DateTime<Utc>) -> Result<u64, SadhyaError> {
    let before = encode_ts(before);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM outbox
                 WHERE status IN ('completed', 'failed') AND created_at < ?1",
                params![before],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of jobs per status, for health reporting.
pub async fn count_by_status(db: &Database) -> Result<Vec<(OutboxStatus, u64)>, SadhyaError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM outbox GROUP BY status ORDER BY status")?;
            let rows = stmt.query_map([], |row| {
                let status: String = row.get(0)?;
                Ok((decode_enum(0, &status)?, row.get::<_, u64>(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sadhya_core::{OrderId, OutboundIntent};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("outbox.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 9, 0, 0).unwrap()
    }

    async fn status_of(db: &Database, id: i64) -> (String, u32) {
        db.connection()
            .call(move |conn| -> Result<(String, u32), rusqlite::Error> {
                conn.query_row(
                    "SELECT status, attempts FROM outbox WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_dequeue_ack_lifecycle() {
        let (db, _dir) = setup_db().await;

        let job = OutboxJob::send(OutboundIntent::text("919800000001", "hello"));
        enqueue_jobs(&db, vec![job.clone()], t0()).await.unwrap();

        let entry = dequeue_job(&db, t0(), t0() + Duration::seconds(60))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.job, job);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.status, OutboxStatus::Processing);

        // Leased: not due again before the lease expires.
        assert!(
            dequeue_job(&db, t0() + Duration::seconds(30), t0() + Duration::seconds(90))
                .await
                .unwrap()
                .is_none()
        );

        ack_job(&db, entry.id).await.unwrap();
        assert_eq!(status_of(&db, entry.id).await.0, "completed");
        assert!(
            dequeue_job(&db, t0() + Duration::hours(1), t0() + Duration::hours(2))
                .await
                .unwrap()
                .is_none()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_makes_job_due_again() {
        let (db, _dir) = setup_db().await;
        let job = OutboxJob::SyncOrder {
            order_id: OrderId("EO260820AAAAAA".into()),
        };
        enqueue_jobs(&db, vec![job], t0()).await.unwrap();

        let first = dequeue_job(&db, t0(), t0() + Duration::seconds(60))
            .await
            .unwrap()
            .unwrap();
        let again = dequeue_job(&db, t0() + Duration::seconds(61), t0() + Duration::seconds(120))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.attempts, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_job_retries_at_given_time_then_parks() {
        let (db, _dir) = setup_db().await;
        enqueue_jobs(
            &db,
            vec![OutboxJob::send(OutboundIntent::text("919800000001", "x"))],
            t0(),
        )
        .await
        .unwrap();

        let entry = dequeue_job(&db, t0(), t0() + Duration::seconds(60))
            .await
            .unwrap()
            .unwrap();
        fail_job(&db, entry.id, "503 from provider", Some(t0() + Duration::seconds(10)))
            .await
            .unwrap();
        assert_eq!(status_of(&db, entry.id).await, ("pending".to_string(), 1));
        assert!(
            dequeue_job(&db, t0() + Duration::seconds(5), t0() + Duration::seconds(65))
                .await
                .unwrap()
                .is_none()
        );

        let entry = dequeue_job(&db, t0() + Duration::seconds(10), t0() + Duration::seconds(70))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.last_error.as_deref(), Some("503 from provider"));
        fail_job(&db, entry.id, "still failing", None).await.unwrap();
        assert_eq!(status_of(&db, entry.id).await, ("failed".to_string(), 2));

        let counts = count_by_status(&db).await.unwrap();
        assert_eq!(counts, vec![(OutboxStatus::Failed, 1)]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn prune_removes_only_finished_jobs_before_cutoff() {
        let (db, _dir) = setup_db().await;
        let send = |body: &str| OutboxJob::send(OutboundIntent::text("919800000001", body));
        enqueue_jobs(&db, vec![send("done"), send("parked"), send("leased")], t0())
            .await
            .unwrap();
        enqueue_jobs(&db, vec![send("recent")], t0() + Duration::days(9))
            .await
            .unwrap();

        let lease = t0() + Duration::seconds(60);
        let done = dequeue_job(&db, t0(), lease).await.unwrap().unwrap();
        ack_job(&db, done.id).await.unwrap();
        let parked = dequeue_job(&db, t0(), lease).await.unwrap().unwrap();
        fail_job(&db, parked.id, "gave up", None).await.unwrap();
        dequeue_job(&db, t0(), t0() + Duration::days(30))
            .await
            .unwrap()
            .unwrap();
        let recent = dequeue_job(&db, t0() + Duration::days(9), t0() + Duration::days(10))
            .await
            .unwrap()
            .unwrap();
        ack_job(&db, recent.id).await.unwrap();

        let removed = prune_finished(&db, t0() + Duration::days(7)).await.unwrap();
        assert_eq!(removed, 2);

        let counts = count_by_status(&db).await.unwrap();
        assert_eq!(
            counts,
            vec![(OutboxStatus::Completed, 1), (OutboxStatus::Processing, 1)]
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_enqueues_no_sqlite_busy() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                enqueue_jobs(
                    &db,
                    vec![OutboxJob::send(OutboundIntent::text(
                        "919800000001",
                        format!("message {i}"),
                    ))],
                    t0(),
                )
                .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 10);
        db.close().await.unwrap();
    }
}

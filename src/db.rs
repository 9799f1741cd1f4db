use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::dataset;
use crate::models::EventRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// The full event log in import order, so first appearance matches the
/// source file.
pub async fn fetch_events(pool: &PgPool) -> anyhow::Result<Vec<EventRecord>> {
    let records = sqlx::query(
        "SELECT driver_id, event_code, read_at \
         FROM driver_risk.events \
         ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(records.len());
    for row in records {
        events.push(EventRecord {
            driver_id: row.try_get("driver_id")?,
            event_code: row.try_get("event_code")?,
            read_timestamp: row.try_get("read_at")?,
        });
    }

    Ok(events)
}

/// Appends every row of the file. Repeated readings are kept, matching what
/// scoring straight from the CSV counts.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let events = dataset::load_csv(csv_path)?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for event in events {
        let result = sqlx::query(
            r#"
            INSERT INTO driver_risk.events (id, driver_id, event_code, read_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.driver_id)
        .bind(event.event_code)
        .bind(event.read_timestamp)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(inserted)
}

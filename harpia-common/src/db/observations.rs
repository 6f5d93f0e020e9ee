//! Observation table operations
//!
//! The store is append-only apart from deletion. Generated candidates are
//! written once per generation run as a single transaction so a concurrent
//! manual entry never sees half a batch.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::observation::validate_coordinates;
use crate::{Error, Observation, ObservationKind, Result};

/// Next free observation id (max + 1, or 1 for an empty store)
pub async fn next_id(pool: &SqlitePool) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM observations")
        .fetch_one(pool)
        .await?;

    Ok(max.unwrap_or(0) + 1)
}

async fn next_id_in(tx: &mut Transaction<'_, Sqlite>) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM observations")
        .fetch_one(&mut **tx)
        .await?;

    Ok(max.unwrap_or(0) + 1)
}

async fn insert_rows(tx: &mut Transaction<'_, Sqlite>, observations: &[Observation]) -> Result<()> {
    for obs in observations {
        sqlx::query(
            r#"
            INSERT INTO observations (id, lat, lon, kind, comment, score, validation_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(obs.id)
        .bind(obs.lat)
        .bind(obs.lon)
        .bind(obs.kind.as_str())
        .bind(&obs.comment)
        .bind(obs.score)
        .bind(&obs.validation_reason)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Append a batch of observations in one transaction, keeping their ids
///
/// Fails without writing anything if any id is already taken or any row has
/// invalid coordinates.
pub async fn append_observations(pool: &SqlitePool, observations: &[Observation]) -> Result<()> {
    if observations.is_empty() {
        return Ok(());
    }

    for obs in observations {
        validate_coordinates(obs.lat, obs.lon)?;
    }

    let mut tx = pool.begin().await?;
    insert_rows(&mut tx, observations).await?;
    tx.commit().await?;

    info!(count = observations.len(), "Appended observations");
    Ok(())
}

/// Append a ranked batch of generated candidates, numbering them at commit
///
/// Ids continue from the store's max id as read inside the transaction, in
/// batch order, so entries added while the run was in progress never
/// collide with the batch. Returns the rows as stored.
pub async fn append_generated(pool: &SqlitePool, ranked: &[Observation]) -> Result<Vec<Observation>> {
    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    for obs in ranked {
        validate_coordinates(obs.lat, obs.lon)?;
    }

    let mut tx = pool.begin().await?;
    let first_id = next_id_in(&mut tx).await?;

    let numbered: Vec<Observation> = ranked
        .iter()
        .zip(first_id..)
        .map(|(obs, id)| Observation { id, ..obs.clone() })
        .collect();

    insert_rows(&mut tx, &numbered).await?;
    tx.commit().await?;

    info!(count = numbered.len(), first_id, "Appended generated candidates");
    Ok(numbered)
}

/// Record a manually entered observation, assigning the next id
///
/// The id is read and used inside one transaction.
pub async fn insert_manual(
    pool: &SqlitePool,
    lat: f64,
    lon: f64,
    kind: ObservationKind,
    comment: &str,
) -> Result<Observation> {
    validate_coordinates(lat, lon)?;

    let mut tx = pool.begin().await?;
    let id = next_id_in(&mut tx).await?;
    let observation = Observation::new(id, lat, lon, kind, comment)?;
    insert_rows(&mut tx, std::slice::from_ref(&observation)).await?;
    tx.commit().await?;

    info!(id, kind = %kind, "Recorded observation");
    Ok(observation)
}

/// Read every observation, ordered by id
pub async fn read_all(pool: &SqlitePool) -> Result<Vec<Observation>> {
    let rows = sqlx::query(
        r#"
        SELECT id, lat, lon, kind, comment, score, validation_reason
        FROM observations
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<Observation> {
            let id: i64 = row.get("id");
            let label: String = row.get("kind");
            let kind: ObservationKind = label
                .parse()
                .map_err(|_| Error::Internal(format!("Observation {} has unknown kind '{}'", id, label)))?;
            Ok(Observation {
                id,
                lat: row.get("lat"),
                lon: row.get("lon"),
                kind,
                comment: row.get("comment"),
                score: row.get("score"),
                validation_reason: row.get("validation_reason"),
            })
        })
        .collect()
}

/// Read observations of a single kind, ordered by id
pub async fn read_by_kind(pool: &SqlitePool, kind: ObservationKind) -> Result<Vec<Observation>> {
    Ok(read_all(pool)
        .await?
        .into_iter()
        .filter(|obs| obs.kind == kind)
        .collect())
}

/// Delete an observation by id
pub async fn delete_observation(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM observations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Observation {}", id)));
    }

    info!(id, "Deleted observation");
    Ok(())
}

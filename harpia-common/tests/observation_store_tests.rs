//! Integration tests for the SQLite observation store
//!
//! Covers id assignment, batch append atomicity, deletion and kind filtering.

use harpia_common::db::{self, observations};
use harpia_common::{Error, Observation, ObservationKind};
use tempfile::TempDir;

fn candidate(id: i64, lat: f64, lon: f64, score: f64) -> Observation {
    let mut obs = Observation::new(id, lat, lon, ObservationKind::GeneratedCandidate, "Generated").unwrap();
    obs.score = Some(score);
    obs.validation_reason = Some("Forested, No prey".to_string());
    obs
}

#[tokio::test]
async fn test_next_id_starts_at_one() {
    let pool = db::init_memory_pool().await.unwrap();
    assert_eq!(observations::next_id(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_manual_entries_get_sequential_ids() {
    let pool = db::init_memory_pool().await.unwrap();

    let first = observations::insert_manual(&pool, 9.0, -80.0, ObservationKind::ProbableNest, "nido")
        .await
        .unwrap();
    let second = observations::insert_manual(&pool, 9.1, -80.1, ObservationKind::Sighting, "")
        .await
        .unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(observations::next_id(&pool).await.unwrap(), 3);
}

#[tokio::test]
async fn test_manual_entry_rejects_out_of_range() {
    let pool = db::init_memory_pool().await.unwrap();

    let result = observations::insert_manual(&pool, 91.0, -80.0, ObservationKind::Sighting, "").await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(observations::read_all(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_append_batch_roundtrips_scores() {
    let pool = db::init_memory_pool().await.unwrap();

    let batch = vec![candidate(10, 9.0, -80.0, 75.0), candidate(11, 9.02, -80.03, 50.0)];
    observations::append_observations(&pool, &batch).await.unwrap();

    let stored = observations::read_all(&pool).await.unwrap();
    assert_eq!(stored, batch);
    assert_eq!(observations::next_id(&pool).await.unwrap(), 12);
}

#[tokio::test]
async fn test_append_batch_is_atomic_on_duplicate_id() {
    let pool = db::init_memory_pool().await.unwrap();
    observations::append_observations(&pool, &[candidate(5, 9.0, -80.0, 50.0)])
        .await
        .unwrap();

    // Second row collides with the existing id 5: nothing from the batch may land
    let batch = vec![candidate(6, 9.0, -80.0, 60.0), candidate(5, 9.1, -80.1, 70.0)];
    assert!(observations::append_observations(&pool, &batch).await.is_err());

    let stored = observations::read_all(&pool).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, 5);
}

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
    let pool = db::init_memory_pool().await.unwrap();
    observations::insert_manual(&pool, 9.0, -80.0, ObservationKind::Sighting, "")
        .await
        .unwrap();

    assert!(matches!(
        observations::delete_observation(&pool, 42).await,
        Err(Error::NotFound(_))
    ));

    observations::delete_observation(&pool, 1).await.unwrap();
    assert!(observations::read_all(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_by_kind_filters() {
    let pool = db::init_memory_pool().await.unwrap();
    observations::insert_manual(&pool, 9.0, -80.0, ObservationKind::ProbableNest, "nido").await.unwrap();
    observations::insert_manual(&pool, 9.1, -80.1, ObservationKind::Sighting, "").await.unwrap();
    observations::insert_manual(&pool, 9.2, -80.2, ObservationKind::ProbableNest, "").await.unwrap();

    let nests = observations::read_by_kind(&pool, ObservationKind::ProbableNest).await.unwrap();
    assert_eq!(nests.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 3]);
}

#[tokio::test]
async fn test_file_database_persists_across_pools() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("harpia.db");

    let pool = db::init_database_pool(&db_path).await.unwrap();
    observations::insert_manual(&pool, 9.0, -80.0, ObservationKind::ProbableNest, "adulto en nido")
        .await
        .unwrap();
    pool.close().await;

    let reopened = db::init_database_pool(&db_path).await.unwrap();
    let stored = observations::read_all(&reopened).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].comment, "adulto en nido");
}

#[tokio::test]
async fn test_append_generated_numbers_after_current_max() {
    let pool = db::init_memory_pool().await.unwrap();
    observations::insert_manual(&pool, 9.0, -80.0, ObservationKind::ProbableNest, "nido").await.unwrap();
    observations::insert_manual(&pool, 9.01, -80.01, ObservationKind::ProbableNest, "creo que").await.unwrap();

    // Provisional ids taken before a manual entry slipped in
    let ranked = vec![candidate(3, 9.0, -80.0, 90.0), candidate(4, 9.02, -80.03, 40.0)];
    let manual = observations::insert_manual(&pool, 9.5, -79.5, ObservationKind::Sighting, "")
        .await
        .unwrap();
    assert_eq!(manual.id, 3);

    let stored = observations::append_generated(&pool, &ranked).await.unwrap();
    assert_eq!(stored.iter().map(|o| o.id).collect::<Vec<_>>(), vec![4, 5]);
    assert_eq!(stored[0].score, Some(90.0));
    assert_eq!(stored[1].score, Some(40.0));

    let all = observations::read_all(&pool).await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[2].kind, ObservationKind::Sighting);
}

#[tokio::test]
async fn test_append_generated_empty_batch_writes_nothing() {
    let pool = db::init_memory_pool().await.unwrap();
    assert!(observations::append_generated(&pool, &[]).await.unwrap().is_empty());
    assert_eq!(observations::next_id(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_corrupt_stored_kind_is_internal_error() {
    let pool = db::init_memory_pool().await.unwrap();
    sqlx::query("INSERT INTO observations (id, lat, lon, kind, comment) VALUES (1, 9.0, -80.0, 'Roost', '')")
        .execute(&pool)
        .await
        .unwrap();

    let err = observations::read_all(&pool).await.unwrap_err();
    assert!(matches!(err, Error::Internal(ref msg) if msg.contains("Roost")));
}

//! Postgres repository tests. Skipped unless DATABASE_URL is set.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pixeldedup::application::ports::{ImageRecordRepository, InsertOutcome};
use pixeldedup::domain::entities::ImageRecord;
use pixeldedup::domain::value_objects::{
    CanonicalPath, ContentHash, ImageMetadata, PerceptualHash, UploadDescriptor,
};
use pixeldedup::infrastructure::persistence::PostgresImageRecordRepository;

async fn setup() -> Option<PostgresImageRecordRepository> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres tests");
        return None;
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(PostgresImageRecordRepository::new(pool))
}

/// Random hash so tests sharing a database never collide
fn unique_hash() -> ContentHash {
    let hex = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    ContentHash::from_hex(hex).unwrap()
}

fn record(hash: &ContentHash, path: &str) -> ImageRecord {
    ImageRecord::new(
        hash.clone(),
        Some(PerceptualHash::from_hex("00ff00ff00ff00ff").unwrap()),
        CanonicalPath::from(path),
        UploadDescriptor {
            original_filename: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            byte_size: 1234,
            upload_context: "post".to_string(),
            uploader_id: 42,
        },
        Some(ImageMetadata {
            width: 64,
            height: 32,
            format: "png".to_string(),
            color_mode: "rgb8".to_string(),
        }),
    )
}

async fn cleanup(repo: &PostgresImageRecordRepository, hash: &ContentHash) {
    sqlx::query("DELETE FROM image_records WHERE content_hash = $1")
        .bind(hash.as_hex())
        .execute(repo.pool())
        .await
        .ok();
}

#[tokio::test]
async fn pg_insert_round_trips_and_is_unique() {
    let Some(repo) = setup().await else { return };
    let hash = unique_hash();
    let path = format!("posts/{}.png", Uuid::new_v4().simple());
    let original = record(&hash, &path);

    assert_eq!(repo.insert(&original).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(
        repo.insert(&record(&hash, "posts/other.png")).await.unwrap(),
        InsertOutcome::AlreadyExists
    );

    let stored = repo.find_active_by_hash(&hash).await.unwrap().unwrap();
    assert_eq!(stored.canonical_path().as_str(), path);
    assert_eq!(stored.perceptual_hash(), original.perceptual_hash());
    assert_eq!(stored.width(), Some(64));
    assert_eq!(stored.color_mode(), Some("rgb8"));
    assert_eq!(stored.first_uploader_id(), 42);
    assert!(repo
        .is_path_referenced(&CanonicalPath::from(path.as_str()))
        .await
        .unwrap());

    cleanup(&repo, &hash).await;
}

#[tokio::test]
async fn pg_reference_counting_retires_at_zero() {
    let Some(repo) = setup().await else { return };
    let hash = unique_hash();
    repo.insert(&record(&hash, "posts/r.png")).await.unwrap();

    assert_eq!(
        repo.increment_ref(&hash).await.unwrap().unwrap().reference_count(),
        2
    );
    assert_eq!(
        repo.decrement_ref(&hash).await.unwrap().unwrap().reference_count(),
        1
    );

    let retired = repo.decrement_ref(&hash).await.unwrap().unwrap();
    assert_eq!(retired.reference_count(), 0);
    assert!(!retired.is_active());
    assert!(retired.retired_at().is_some());

    assert!(repo.decrement_ref(&hash).await.unwrap().is_none());
    assert!(repo.increment_ref(&hash).await.unwrap().is_none());
    assert!(repo.find_active_by_hash(&hash).await.unwrap().is_none());

    cleanup(&repo, &hash).await;
}

#[tokio::test]
async fn pg_reactivate_and_sweep() {
    let Some(repo) = setup().await else { return };
    let hash = unique_hash();
    let original = record(&hash, "posts/s.png");
    repo.insert(&original).await.unwrap();
    assert!(!repo.reactivate(&original).await.unwrap());

    repo.decrement_ref(&hash).await.unwrap();

    // Grace window not yet over
    let past = Utc::now() - Duration::hours(1);
    assert!(repo.delete_if_orphaned(&hash, Some(past)).await.unwrap().is_none());

    let orphans = repo
        .find_orphaned(Utc::now() + Duration::seconds(5), 1000)
        .await
        .unwrap();
    assert!(orphans.iter().any(|r| r.content_hash() == &hash));

    let mut revived = repo.find_by_hash(&hash).await.unwrap().unwrap();
    revived
        .reactivate(
            CanonicalPath::from("profiles/s.png"),
            UploadDescriptor {
                original_filename: "s.png".to_string(),
                mime_type: "image/png".to_string(),
                byte_size: 1234,
                upload_context: "profile".to_string(),
                uploader_id: 7,
            },
            None,
            None,
        )
        .unwrap();
    assert!(repo.reactivate(&revived).await.unwrap());
    assert!(repo.delete_if_orphaned(&hash, None).await.unwrap().is_none());

    let active = repo.find_active_by_hash(&hash).await.unwrap().unwrap();
    assert_eq!(active.canonical_path().as_str(), "profiles/s.png");
    assert_eq!(active.first_uploader_id(), 42);
    assert!(active.perceptual_hash().is_none());

    repo.decrement_ref(&hash).await.unwrap();
    let deleted = repo.delete_if_orphaned(&hash, None).await.unwrap();
    assert!(deleted.is_some());
    assert!(repo.find_by_hash(&hash).await.unwrap().is_none());
}

#[tokio::test]
async fn pg_statistics_reflect_new_duplicates() {
    let Some(repo) = setup().await else { return };
    let hash = unique_hash();

    repo.insert(&record(&hash, "posts/t.png")).await.unwrap();
    repo.increment_ref(&hash).await.unwrap();
    let stats = repo.statistics().await.unwrap();

    // Other tests share the table, so only lower bounds hold
    assert!(stats.unique_count >= 1);
    assert!(stats.duplicate_count >= 1);
    assert!(stats.total_references >= 2);
    assert!(stats.bytes_saved_estimate >= 1);
    assert_eq!(
        stats.bytes_saved_estimate,
        stats.total_references - stats.unique_count
    );

    cleanup(&repo, &hash).await;
}

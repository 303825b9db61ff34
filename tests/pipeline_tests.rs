//! End-to-end pipeline tests against an in-memory DuckDB warehouse

#![cfg(feature = "duckdb-backend")]

use std::fs;
use std::path::Path;

use dwh_etl::pipeline::{Phase, Pipeline, PipelineError};
use dwh_etl::staging::IngestError;
use dwh_etl::warehouse::{DuckDBWarehouse, PipelineConfig, Warehouse};
use serde_json::json;
use tempfile::TempDir;

const EVENTS: &str = r#"{"artist":"Artist A","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":218.5,"level":"free","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"PUT","page":"NextSong","registration":1541048010796.0,"sessionId":818,"song":"Song A","status":200,"ts":1541121934796,"userAgent":"Mozilla/5.0","userId":"5"}
{"artist":null,"auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":1,"lastName":"Koch","length":null,"level":"free","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"GET","page":"Home","registration":1541048010796.0,"sessionId":818,"song":null,"status":200,"ts":1541121940000,"userAgent":"Mozilla/5.0","userId":"5"}
{"artist":"Nobody","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":2,"lastName":"Koch","length":199.0,"level":"paid","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"PUT","page":"NextSong","registration":1541048010796.0,"sessionId":818,"song":"Unknown Song","status":200,"ts":1541122000000,"userAgent":"Mozilla/5.0","userId":"5"}
{"artist":null,"auth":"Logged Out","firstName":null,"gender":null,"itemInSession":0,"lastName":null,"length":null,"level":"free","location":null,"method":"GET","page":"Home","registration":null,"sessionId":901,"song":null,"status":200,"ts":1541122100000,"userAgent":null,"userId":""}
"#;

const SONG_A: &str = r#"{"num_songs": 1, "artist_id": "AR1", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "Artist A", "song_id": "S1", "title": "Song A", "duration": 218.5, "year": 1994}"#;

const SONG_WITHOUT_ID: &str = r#"{"num_songs": 1, "artist_id": "AR2", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Artist B", "song_id": null, "title": "Untitled", "duration": 120.0, "year": 0}"#;

const SONG_WITHOUT_ARTIST: &str = r#"{"num_songs": 1, "artist_id": null, "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Artist C", "song_id": "S3", "title": "Song C", "duration": 98.2, "year": 2004}"#;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Lay out log and song directories the way the source bucket does
fn sample_data(dir: &TempDir, events: &str) -> PipelineConfig {
    let log_data = dir.path().join("log_data");
    let song_data = dir.path().join("song_data");

    write(&log_data.join("2018/11/2018-11-02-events.json"), events);
    write(&song_data.join("A/B/C/TRABCAA128F42A1.json"), SONG_A);
    // Same song delivered twice
    write(&song_data.join("A/B/D/TRABDAA128F42A1.json"), SONG_A);
    write(&song_data.join("A/C/A/TRACAAA128F42A2.json"), SONG_WITHOUT_ID);
    write(&song_data.join("A/C/B/TRACBAA128F42A3.json"), SONG_WITHOUT_ARTIST);

    PipelineConfig::duckdb(
        "dwh.duckdb",
        log_data.to_string_lossy(),
        song_data.to_string_lossy(),
    )
}

async fn count(warehouse: &DuckDBWarehouse, sql: &str) -> i64 {
    warehouse
        .query(sql)
        .await
        .unwrap()
        .scalar_i64()
        .unwrap()
}

#[tokio::test]
async fn test_drop_then_create_is_idempotent() {
    let warehouse = DuckDBWarehouse::in_memory().unwrap();
    let config = PipelineConfig::new();
    let pipeline = Pipeline::new(&warehouse, &config);

    pipeline.create_tables().await.unwrap();
    warehouse
        .execute("INSERT INTO dimUser (user_id, level) VALUES (1, 'free')")
        .await
        .unwrap();

    let report = pipeline.create_tables().await.unwrap();
    assert_eq!(report.statements[&Phase::Drop], 7);
    assert_eq!(report.statements[&Phase::Create], 7);
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM dimUser").await, 0);
}

#[tokio::test]
async fn test_end_to_end_song_play() {
    let dir = TempDir::new().unwrap();
    let config = sample_data(&dir, EVENTS);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();

    let report = Pipeline::new(&warehouse, &config)
        .run_all()
        .await
        .unwrap();

    assert_eq!(report.total_statements(), 7 + 7 + 2 + 5);
    assert_eq!(report.loads.len(), 2);
    assert_eq!(report.loads[0].records_ingested, 4);
    assert_eq!(report.loads[1].records_ingested, 4);
    assert_eq!(report.loads[1].files_processed, 4);

    let plays = warehouse
        .query(
            "SELECT songplay_id, start_time, user_id, level, song_id, artist_id, session_id \
             FROM factSongplay",
        )
        .await
        .unwrap();

    assert_eq!(plays.row_count(), 1);
    let play = &plays.rows[0];
    assert_eq!(play["songplay_id"], json!(0));
    assert_eq!(play["start_time"], json!("2018-11-02 01:25:34"));
    assert_eq!(play["user_id"], json!(5));
    assert_eq!(play["level"], json!("free"));
    assert_eq!(play["song_id"], json!("S1"));
    assert_eq!(play["artist_id"], json!("AR1"));
    assert_eq!(play["session_id"], json!("818"));
}

#[tokio::test]
async fn test_start_time_breakdown_matches_fact_table() {
    let dir = TempDir::new().unwrap();
    let config = sample_data(&dir, EVENTS);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();
    Pipeline::new(&warehouse, &config).run_all().await.unwrap();

    // One row per distinct timestamp
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM dimTime").await, 4);

    let joined = count(
        &warehouse,
        "SELECT COUNT(*) AS n FROM factSongplay f JOIN dimTime t ON f.start_time = t.start_time",
    )
    .await;
    assert_eq!(joined, 1);

    let parts = warehouse
        .query(
            "SELECT hour, day, week, month, year, weekday FROM dimTime \
             WHERE start_time = TIMESTAMP '2018-11-02 01:25:34'",
        )
        .await
        .unwrap();

    assert_eq!(parts.row_count(), 1);
    let row = &parts.rows[0];
    assert_eq!(row["hour"], json!(1));
    assert_eq!(row["day"], json!(2));
    assert_eq!(row["week"], json!(44));
    assert_eq!(row["month"], json!(11));
    assert_eq!(row["year"], json!(2018));
    // Friday, counting from Sunday = 0
    assert_eq!(row["weekday"], json!(5));
}

#[tokio::test]
async fn test_dimension_filters_and_dedup() {
    let dir = TempDir::new().unwrap();
    let config = sample_data(&dir, EVENTS);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();
    Pipeline::new(&warehouse, &config).run_all().await.unwrap();

    // S1 arrives twice; the song without an id is skipped
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM dimSong").await, 2);
    assert_eq!(
        count(&warehouse, "SELECT COUNT(*) AS n FROM dimSong WHERE song_id IS NULL").await,
        0
    );

    // AR1 arrives twice; the song without an artist id is skipped
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM dimArtist").await, 2);
    assert_eq!(
        count(&warehouse, "SELECT COUNT(*) AS n FROM dimArtist WHERE artist_id IS NULL").await,
        0
    );

    // User 5 upgraded from free to paid between events
    assert_eq!(
        count(&warehouse, "SELECT COUNT(*) AS n FROM dimUser WHERE user_id = 5").await,
        2
    );
}

#[tokio::test]
async fn test_only_next_song_events_become_song_plays() {
    let dir = TempDir::new().unwrap();
    let events = EVENTS.replace("\"page\":\"NextSong\"", "\"page\":\"Settings\"");
    let config = sample_data(&dir, &events);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();

    Pipeline::new(&warehouse, &config).run_all().await.unwrap();

    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM staging_events").await, 4);
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM factSongplay").await, 0);
}

#[tokio::test]
async fn test_malformed_record_fails_whole_load() {
    let dir = TempDir::new().unwrap();
    let events = format!("{}{{\"page\": \"NextSong\", \"ts\": \n", EVENTS);
    let config = sample_data(&dir, &events);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();
    let pipeline = Pipeline::new(&warehouse, &config);

    let err = pipeline.run_all().await.unwrap_err();
    match err {
        PipelineError::Load { index, source } => {
            assert_eq!(index, 0);
            assert!(matches!(source, IngestError::JsonParse { record: 4, .. }));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM staging_events").await, 0);
}

#[tokio::test]
async fn test_rerun_without_drop_hits_time_key() {
    let dir = TempDir::new().unwrap();
    let config = sample_data(&dir, EVENTS);
    let warehouse = DuckDBWarehouse::in_memory().unwrap();
    let pipeline = Pipeline::new(&warehouse, &config);

    pipeline.run_all().await.unwrap();
    let err = pipeline.etl().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Statement {
            phase: Phase::Insert,
            index: 4,
            ..
        }
    ));
    // Staging and the earlier transforms appended before the failure
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM staging_events").await, 8);
    assert_eq!(count(&warehouse, "SELECT COUNT(*) AS n FROM factSongplay").await, 2);
}

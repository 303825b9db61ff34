//! INSERT ... SELECT statements building the star schema from staging rows
//!
//! Every transform is a `SELECT DISTINCT` over one or both staging tables.
//! Rows are appended; re-running without dropping the tables first duplicates
//! them.

use super::Dialect;
use super::schema::{DIM_ARTIST, DIM_SONG, DIM_TIME, DIM_USER, FACT_SONGPLAY, TableDef};

/// One transform statement and the table it fills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub target: &'static TableDef,
    pub sql: String,
}

/// Songplays: `NextSong` events joined to song metadata on exact title and
/// artist name. Events without a matching song are dropped.
pub fn songplay_insert(dialect: Dialect) -> Transform {
    let start_time = dialect.start_time_expr("se.ts");
    let sql = format!(
        "INSERT INTO {table} (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT {start_time} AS start_time,
    se.userId,
    se.level,
    ss.song_id,
    ss.artist_id,
    se.sessionId,
    se.location,
    se.userAgent
FROM staging_events se
INNER JOIN staging_songs ss ON (se.song = ss.title AND se.artist = ss.artist_name)
WHERE se.page = 'NextSong' AND {start_time} IS NOT NULL",
        table = FACT_SONGPLAY.name,
        start_time = start_time,
    );

    Transform {
        target: &FACT_SONGPLAY,
        sql,
    }
}

/// Users: distinct user attributes from every event.
///
/// There is no tiebreak when a user's `level` changes between events, so a
/// user can appear once per level.
pub fn user_insert() -> Transform {
    let sql = format!(
        "INSERT INTO {} (user_id, first_name, last_name, gender, level)
SELECT DISTINCT userId AS user_id,
    firstName AS first_name,
    lastName AS last_name,
    gender,
    level
FROM staging_events se",
        DIM_USER.name
    );

    Transform {
        target: &DIM_USER,
        sql,
    }
}

pub fn song_insert() -> Transform {
    let sql = format!(
        "INSERT INTO {} (song_id, title, artist_id, year, duration)
SELECT DISTINCT song_id,
    title,
    artist_id,
    year,
    duration
FROM staging_songs
WHERE song_id IS NOT NULL",
        DIM_SONG.name
    );

    Transform {
        target: &DIM_SONG,
        sql,
    }
}

pub fn artist_insert() -> Transform {
    let sql = format!(
        "INSERT INTO {} (artist_id, name, location, latitude, longitude)
SELECT DISTINCT artist_id,
    artist_name AS name,
    artist_location AS location,
    artist_latitude AS latitude,
    artist_longitude AS longitude
FROM staging_songs
WHERE artist_id IS NOT NULL",
        DIM_ARTIST.name
    );

    Transform {
        target: &DIM_ARTIST,
        sql,
    }
}

/// Calendar breakdown for every distinct start time.
///
/// Parts are extracted over a derived table so no dialect has to resolve a
/// select-list alias.
pub fn time_insert(dialect: Dialect) -> Transform {
    let sql = format!(
        "INSERT INTO {table} (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT t.start_time,
    EXTRACT(hour FROM t.start_time),
    EXTRACT(day FROM t.start_time),
    EXTRACT(week FROM t.start_time),
    EXTRACT(month FROM t.start_time),
    EXTRACT(year FROM t.start_time),
    EXTRACT({weekday} FROM t.start_time)
FROM (
    SELECT {start_time} AS start_time
    FROM staging_events se
    WHERE se.ts IS NOT NULL
) t",
        table = DIM_TIME.name,
        weekday = dialect.weekday_part(),
        start_time = dialect.start_time_expr("se.ts"),
    );

    Transform {
        target: &DIM_TIME,
        sql,
    }
}

/// All transforms in execution order
pub fn all(dialect: Dialect) -> Vec<Transform> {
    vec![
        songplay_insert(dialect),
        user_insert(),
        song_insert(),
        artist_insert(),
        time_insert(dialect),
    ]
}

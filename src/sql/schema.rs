//! Table definitions for the staging area and the star schema
//!
//! Tables are declared as static data and rendered to DDL per dialect. The
//! same definitions drive the local JSON loader, which maps JSON fields onto
//! staging columns by name and type.

use super::{Capabilities, Dialect};

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    /// Bounded text; longer values are truncated on load
    Varchar(u16),
    SmallInt,
    Integer,
    BigInt,
    /// 8-byte floating point
    Float,
    Timestamp,
}

impl ColumnType {
    /// SQL type name for a dialect
    pub fn sql(self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::Text, _) => "TEXT".to_string(),
            (ColumnType::Varchar(n), _) => format!("VARCHAR({})", n),
            (ColumnType::SmallInt, _) => "SMALLINT".to_string(),
            (ColumnType::Integer, Dialect::Redshift) => "INT".to_string(),
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::BigInt, _) => "BIGINT".to_string(),
            (ColumnType::Float, Dialect::Redshift) => "FLOAT".to_string(),
            (ColumnType::Float, _) => "DOUBLE PRECISION".to_string(),
            (ColumnType::Timestamp, _) => "TIMESTAMP".to_string(),
        }
    }

    /// Whether values are stored as integers
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

/// A column declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
    pub primary_key: bool,
    /// Auto-incrementing surrogate key starting at 0
    pub identity: bool,
    pub dist_key: bool,
    pub sort_key: bool,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            not_null: false,
            primary_key: false,
            identity: false,
            dist_key: false,
            sort_key: false,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub const fn dist_key(mut self) -> Self {
        self.dist_key = true;
        self
    }

    pub const fn sort_key(mut self) -> Self {
        self.sort_key = true;
        self
    }

    fn render(&self, table: &TableDef, dialect: Dialect, caps: Capabilities) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.sql(dialect));

        if self.identity {
            if caps.identity_columns {
                sql.push_str(" IDENTITY(0,1)");
            } else {
                sql.push_str(&format!(" DEFAULT nextval('{}')", table.sequence_name()));
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if caps.physical_layout_hints {
            if self.dist_key {
                sql.push_str(" DISTKEY");
            }
            if self.sort_key {
                sql.push_str(" SORTKEY");
            }
        }

        sql
    }
}

/// A table declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    fn identity_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.identity)
    }

    /// Name of the sequence backing the identity column on dialects without
    /// native identity support
    pub fn sequence_name(&self) -> String {
        let column = self.identity_column().map(|c| c.name).unwrap_or("id");
        format!("{}_{}_seq", self.name.to_lowercase(), column)
    }

    fn needs_sequence(&self, caps: Capabilities) -> bool {
        !caps.identity_columns && self.identity_column().is_some()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement
    pub fn create_sql(&self, dialect: Dialect, caps: Capabilities) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.render(self, dialect, caps)))
            .collect();

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            columns.join(",\n")
        );

        if self.needs_sequence(caps) {
            format!(
                "CREATE SEQUENCE IF NOT EXISTS {} START WITH 0 MINVALUE 0;\n{}",
                self.sequence_name(),
                create_table
            )
        } else {
            create_table
        }
    }

    /// `DROP TABLE IF EXISTS` statement
    ///
    /// Also drops the identity sequence where one is created with the table.
    pub fn drop_sql(&self, caps: Capabilities) -> String {
        let drop_table = format!("DROP TABLE IF EXISTS {}", self.name);

        if self.needs_sequence(caps) {
            format!(
                "{};\nDROP SEQUENCE IF EXISTS {}",
                drop_table,
                self.sequence_name()
            )
        } else {
            drop_table
        }
    }
}

// =============================================================================
// Staging tables
// =============================================================================

pub static STAGING_EVENTS: TableDef = TableDef {
    name: "staging_events",
    columns: &[
        ColumnDef::new("artist", ColumnType::Text),
        ColumnDef::new("auth", ColumnType::Text),
        ColumnDef::new("firstName", ColumnType::Text),
        ColumnDef::new("gender", ColumnType::Varchar(1)),
        ColumnDef::new("itemInSession", ColumnType::SmallInt),
        ColumnDef::new("lastName", ColumnType::Text),
        ColumnDef::new("length", ColumnType::Float),
        ColumnDef::new("level", ColumnType::Text),
        ColumnDef::new("location", ColumnType::Text),
        ColumnDef::new("method", ColumnType::Text),
        ColumnDef::new("page", ColumnType::Text),
        ColumnDef::new("registration", ColumnType::Float),
        ColumnDef::new("sessionId", ColumnType::Text),
        ColumnDef::new("song", ColumnType::Text),
        ColumnDef::new("status", ColumnType::SmallInt),
        ColumnDef::new("ts", ColumnType::BigInt),
        ColumnDef::new("userAgent", ColumnType::Text),
        ColumnDef::new("userId", ColumnType::BigInt),
    ],
};

pub static STAGING_SONGS: TableDef = TableDef {
    name: "staging_songs",
    columns: &[
        ColumnDef::new("num_songs", ColumnType::BigInt),
        ColumnDef::new("artist_id", ColumnType::Text),
        ColumnDef::new("artist_latitude", ColumnType::Float),
        ColumnDef::new("artist_longitude", ColumnType::Float),
        ColumnDef::new("artist_location", ColumnType::Text),
        ColumnDef::new("artist_name", ColumnType::Text),
        ColumnDef::new("song_id", ColumnType::Text),
        ColumnDef::new("title", ColumnType::Text),
        ColumnDef::new("duration", ColumnType::Float),
        ColumnDef::new("year", ColumnType::SmallInt),
    ],
};

// =============================================================================
// Fact table
// =============================================================================

pub static FACT_SONGPLAY: TableDef = TableDef {
    name: "factSongplay",
    columns: &[
        ColumnDef::new("songplay_id", ColumnType::Integer)
            .identity()
            .primary_key(),
        ColumnDef::new("start_time", ColumnType::Timestamp).dist_key(),
        ColumnDef::new("user_id", ColumnType::BigInt),
        ColumnDef::new("level", ColumnType::Text),
        ColumnDef::new("song_id", ColumnType::Text),
        ColumnDef::new("artist_id", ColumnType::Text),
        ColumnDef::new("session_id", ColumnType::Text),
        ColumnDef::new("location", ColumnType::Text),
        ColumnDef::new("user_agent", ColumnType::Text),
    ],
};

// =============================================================================
// Dimension tables
// =============================================================================

pub static DIM_USER: TableDef = TableDef {
    name: "dimUser",
    columns: &[
        ColumnDef::new("user_id", ColumnType::BigInt).sort_key(),
        ColumnDef::new("first_name", ColumnType::Text),
        ColumnDef::new("last_name", ColumnType::Text),
        ColumnDef::new("gender", ColumnType::Text),
        ColumnDef::new("level", ColumnType::Text),
    ],
};

pub static DIM_SONG: TableDef = TableDef {
    name: "dimSong",
    columns: &[
        ColumnDef::new("song_id", ColumnType::Text),
        ColumnDef::new("title", ColumnType::Text),
        ColumnDef::new("artist_id", ColumnType::Text),
        ColumnDef::new("year", ColumnType::SmallInt),
        ColumnDef::new("duration", ColumnType::Float),
    ],
};

pub static DIM_ARTIST: TableDef = TableDef {
    name: "dimArtist",
    columns: &[
        ColumnDef::new("artist_id", ColumnType::Text),
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("location", ColumnType::Text),
        ColumnDef::new("latitude", ColumnType::Float),
        ColumnDef::new("longitude", ColumnType::Float),
    ],
};

pub static DIM_TIME: TableDef = TableDef {
    name: "dimTime",
    columns: &[
        ColumnDef::new("start_time", ColumnType::Timestamp)
            .not_null()
            .primary_key()
            .dist_key()
            .sort_key(),
        ColumnDef::new("hour", ColumnType::SmallInt),
        ColumnDef::new("day", ColumnType::SmallInt),
        ColumnDef::new("week", ColumnType::SmallInt),
        ColumnDef::new("month", ColumnType::SmallInt),
        ColumnDef::new("year", ColumnType::SmallInt),
        ColumnDef::new("weekday", ColumnType::SmallInt),
    ],
};

/// All tables in create (and drop) order
pub static ALL_TABLES: [&TableDef; 7] = [
    &STAGING_EVENTS,
    &STAGING_SONGS,
    &FACT_SONGPLAY,
    &DIM_USER,
    &DIM_SONG,
    &DIM_ARTIST,
    &DIM_TIME,
];

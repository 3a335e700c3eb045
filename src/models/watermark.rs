use crate::schema::feed_data;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Last observed item time and title for one feed, keyed by subscription name.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = feed_data)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Watermark {
    pub rss_name: String,
    /// microseconds since the Unix epoch
    pub last_update_time: i64,
    pub latest_title: String,
}

impl Watermark {
    pub fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.last_update_time).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn get(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Watermark>> {
        use crate::schema::feed_data::dsl::feed_data;
        feed_data
            .find(name)
            .select(Watermark::as_select())
            .first(conn)
            .optional()
    }

    /// Returns the stored watermark and `true`, or creates an epoch record and
    /// returns it with `false`.
    pub fn get_or_create(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> QueryResult<(Watermark, bool)> {
        if let Some(found) = Watermark::get(conn, name)? {
            return Ok((found, true));
        }
        let created = Watermark::create(conn, name, DateTime::<Utc>::UNIX_EPOCH)?;
        Ok((created, false))
    }

    /// Insert a record unless one already exists for `name`.
    pub fn create(
        conn: &mut SqliteConnection,
        name: &str,
        time: DateTime<Utc>,
    ) -> QueryResult<Watermark> {
        use crate::schema::feed_data::dsl::feed_data;
        let record = Watermark {
            rss_name: name.to_string(),
            last_update_time: time.timestamp_micros(),
            latest_title: String::new(),
        };
        diesel::insert_or_ignore_into(feed_data)
            .values(&record)
            .execute(conn)?;
        Ok(record)
    }

    /// Move the watermark forward to `time`. Returns `false` when the stored
    /// time is already at or past `time`, in which case nothing changes.
    pub fn advance(
        conn: &mut SqliteConnection,
        name: &str,
        time: DateTime<Utc>,
        title: &str,
    ) -> QueryResult<bool> {
        use crate::schema::feed_data::dsl::*;
        let micros = time.timestamp_micros();
        let updated = diesel::update(
            feed_data
                .filter(rss_name.eq(name))
                .filter(last_update_time.lt(micros)),
        )
        .set((last_update_time.eq(micros), latest_title.eq(title)))
        .execute(conn)?;
        Ok(updated > 0)
    }

    pub fn delete(conn: &mut SqliteConnection, name: &str) -> QueryResult<usize> {
        use crate::schema::feed_data::dsl::feed_data;
        diesel::delete(feed_data.find(name)).execute(conn)
    }
}

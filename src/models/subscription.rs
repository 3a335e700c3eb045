use super::watermark::Watermark;
use crate::schema::subscriptions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct SubscriptionRow {
    id: i32,
    rss_url: String,
    rss_name: String,
    users: String,
    channel: bool,
}

/// A feed and the users who receive its matching items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: i32,
    pub url: String,
    /// unique, used as the watermark key
    pub name: String,
    pub users: Vec<i64>,
    /// announcement-style formatting with an extracted image
    pub channel: bool,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            id: row.id,
            url: row.rss_url,
            name: row.rss_name,
            users: parse_user_ids(&row.users),
            channel: row.channel,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription<'a> {
    pub rss_url: &'a str,
    pub rss_name: &'a str,
    pub users: String,
    pub channel: bool,
}

impl NewSubscription<'_> {
    pub fn insert(&self, conn: &mut SqliteConnection) -> QueryResult<Subscription> {
        use crate::schema::subscriptions::dsl::subscriptions;
        let row = diesel::insert_into(subscriptions)
            .values(self)
            .returning(SubscriptionRow::as_returning())
            .get_result(conn)?;
        Ok(row.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
    Created(Subscription),
    Joined(Subscription),
    AlreadySubscribed(Subscription),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// user removed, other users remain
    Left,
    /// last user removed, subscription and watermark deleted
    Removed,
    NotSubscribed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionInfo {
    pub name: String,
    pub url: String,
    pub channel: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn get_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Subscription>> {
        use crate::schema::subscriptions::dsl::{id, subscriptions};
        let rows = subscriptions
            .order(id.asc())
            .select(SubscriptionRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    pub fn get_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Subscription>> {
        use crate::schema::subscriptions::dsl::{rss_name, subscriptions};
        let row = subscriptions
            .filter(rss_name.eq(name))
            .select(SubscriptionRow::as_select())
            .first(conn)
            .optional()?;
        Ok(row.map(Subscription::from))
    }

    pub fn get_by_url_or_name(
        conn: &mut SqliteConnection,
        url: &str,
        name: &str,
    ) -> QueryResult<Option<Subscription>> {
        use crate::schema::subscriptions::dsl::{id, rss_name, rss_url, subscriptions};
        let row = subscriptions
            .filter(rss_url.eq(url).or(rss_name.eq(name)))
            .order(id.asc())
            .select(SubscriptionRow::as_select())
            .first(conn)
            .optional()?;
        Ok(row.map(Subscription::from))
    }

    pub fn get_all_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> QueryResult<Vec<Subscription>> {
        let all = Subscription::get_all(conn)?;
        Ok(all
            .into_iter()
            .filter(|sub| sub.users.contains(&user_id))
            .collect())
    }

    /// The user's subscriptions with the time of the newest item seen so far.
    pub fn list_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> QueryResult<Vec<SubscriptionInfo>> {
        let mut infos = Vec::new();
        for sub in Subscription::get_all_for_user(conn, user_id)? {
            let last_update = Watermark::get(conn, &sub.name)?
                .map(|w| w.last_seen())
                .filter(|t| *t > DateTime::<Utc>::UNIX_EPOCH);
            infos.push(SubscriptionInfo {
                name: sub.name,
                url: sub.url,
                channel: sub.channel,
                last_update,
            });
        }
        Ok(infos)
    }

    pub fn set_users(conn: &mut SqliteConnection, sub_id: i32, user_ids: &[i64]) -> QueryResult<usize> {
        use crate::schema::subscriptions::dsl::{subscriptions, users};
        diesel::update(subscriptions.find(sub_id))
            .set(users.eq(encode_user_ids(user_ids)))
            .execute(conn)
    }

    pub fn delete(conn: &mut SqliteConnection, sub_id: i32) -> QueryResult<usize> {
        use crate::schema::subscriptions::dsl::subscriptions;
        diesel::delete(subscriptions.find(sub_id)).execute(conn)
    }

    /// Add `user_id` to the subscription matching `url` or `name`, creating the
    /// subscription and its watermark (at `initial_watermark`) when neither exists.
    pub fn subscribe(
        conn: &mut SqliteConnection,
        user_id: i64,
        url: &str,
        name: &str,
        channel: bool,
        initial_watermark: DateTime<Utc>,
    ) -> QueryResult<SubscribeOutcome> {
        conn.immediate_transaction(|conn| {
            match Subscription::get_by_url_or_name(conn, url, name)? {
                None => {
                    let created = NewSubscription {
                        rss_url: url,
                        rss_name: name,
                        users: encode_user_ids(&[user_id]),
                        channel,
                    }
                    .insert(conn)?;
                    Watermark::create(conn, name, initial_watermark)?;
                    log::info!("Created subscription {} for user {}", name, user_id);
                    Ok(SubscribeOutcome::Created(created))
                }
                Some(existing) if existing.users.contains(&user_id) => {
                    Ok(SubscribeOutcome::AlreadySubscribed(existing))
                }
                Some(mut existing) => {
                    existing.users.push(user_id);
                    Subscription::set_users(conn, existing.id, &existing.users)?;
                    log::info!("User {} joined subscription {}", user_id, existing.name);
                    Ok(SubscribeOutcome::Joined(existing))
                }
            }
        })
    }

    /// Remove `user_id` from the named subscription, deleting it with its
    /// watermark once nobody is left.
    pub fn unsubscribe(
        conn: &mut SqliteConnection,
        user_id: i64,
        name: &str,
    ) -> QueryResult<UnsubscribeOutcome> {
        conn.immediate_transaction(|conn| {
            let Some(mut existing) = Subscription::get_by_name(conn, name)? else {
                return Ok(UnsubscribeOutcome::NotFound);
            };
            if !existing.users.contains(&user_id) {
                return Ok(UnsubscribeOutcome::NotSubscribed);
            }
            existing.users.retain(|u| *u != user_id);

            if existing.users.is_empty() {
                Subscription::delete(conn, existing.id)?;
                Watermark::delete(conn, &existing.name)?;
                log::info!("Removed subscription {} after its last user left", name);
                Ok(UnsubscribeOutcome::Removed)
            } else {
                Subscription::set_users(conn, existing.id, &existing.users)?;
                Ok(UnsubscribeOutcome::Left)
            }
        })
    }
}

/// Reads a JSON array of ids, falling back to the legacy `",1,2,"` form.
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<i64>>(trimmed) {
            Ok(ids) => return ids,
            Err(e) => log::warn!("Malformed user list {:?}: {}", raw, e),
        }
    }
    trimmed
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

pub fn encode_user_ids(user_ids: &[i64]) -> String {
    let joined = user_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("[{}]", joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::get_test_db_connection;

    #[test]
    fn test_parse_user_ids_formats() {
        assert_eq!(parse_user_ids("[1,2,3]"), vec![1, 2, 3]);
        assert_eq!(parse_user_ids(",1,2,"), vec![1, 2]);
        assert_eq!(parse_user_ids("1, 2"), vec![1, 2]);
        assert_eq!(parse_user_ids(""), Vec::<i64>::new());
        assert_eq!(parse_user_ids("[]"), Vec::<i64>::new());
    }

    #[test]
    fn test_encode_user_ids_is_json() {
        let encoded = encode_user_ids(&[7, -100123]);
        assert_eq!(encoded, "[7,-100123]");
        assert_eq!(parse_user_ids(&encoded), vec![7, -100123]);
    }

    #[test]
    fn test_subscribe_creates_then_joins() {
        let mut conn = get_test_db_connection();
        let url = "https://example.com/feed.xml";

        let created =
            Subscription::subscribe(&mut conn, 1, url, "Tech", false, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert!(matches!(created, SubscribeOutcome::Created(ref s) if s.users == vec![1]));
        assert!(Watermark::get(&mut conn, "Tech").unwrap().is_some());

        // same url under a different name joins the existing subscription
        let joined =
            Subscription::subscribe(&mut conn, 2, url, "Other", false, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert!(matches!(joined, SubscribeOutcome::Joined(ref s) if s.users == vec![1, 2]));

        let again =
            Subscription::subscribe(&mut conn, 2, url, "Tech", false, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert!(matches!(again, SubscribeOutcome::AlreadySubscribed(_)));

        let all = Subscription::get_all(&mut conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].users, vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_removes_when_empty() {
        let mut conn = get_test_db_connection();
        let url = "https://example.com/feed.xml";
        Subscription::subscribe(&mut conn, 1, url, "Tech", true, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        Subscription::subscribe(&mut conn, 2, url, "Tech", true, DateTime::<Utc>::UNIX_EPOCH).unwrap();

        assert_eq!(
            Subscription::unsubscribe(&mut conn, 3, "Tech").unwrap(),
            UnsubscribeOutcome::NotSubscribed
        );
        assert_eq!(
            Subscription::unsubscribe(&mut conn, 1, "Missing").unwrap(),
            UnsubscribeOutcome::NotFound
        );
        assert_eq!(
            Subscription::unsubscribe(&mut conn, 1, "Tech").unwrap(),
            UnsubscribeOutcome::Left
        );
        assert_eq!(
            Subscription::unsubscribe(&mut conn, 2, "Tech").unwrap(),
            UnsubscribeOutcome::Removed
        );

        assert!(Subscription::get_by_name(&mut conn, "Tech").unwrap().is_none());
        assert!(Watermark::get(&mut conn, "Tech").unwrap().is_none());
    }

    #[test]
    fn test_list_for_user_hides_epoch_watermark() {
        let mut conn = get_test_db_connection();
        Subscription::subscribe(&mut conn, 1, "https://a/feed", "A", false, DateTime::<Utc>::UNIX_EPOCH)
            .unwrap();
        Subscription::subscribe(&mut conn, 2, "https://b/feed", "B", false, DateTime::<Utc>::UNIX_EPOCH)
            .unwrap();
        let seen = Utc::now();
        Watermark::advance(&mut conn, "A", seen, "latest").unwrap();

        let listed = Subscription::list_for_user(&mut conn, 1).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "A");
        assert_eq!(
            listed[0].last_update.map(|t| t.timestamp_micros()),
            Some(seen.timestamp_micros())
        );

        Subscription::subscribe(&mut conn, 1, "https://b/feed", "B", false, DateTime::<Utc>::UNIX_EPOCH)
            .unwrap();
        let listed = Subscription::list_for_user(&mut conn, 1).unwrap();
        assert_eq!(listed[1].last_update, None);
    }

    #[test]
    fn test_legacy_user_list_is_read() {
        let mut conn = get_test_db_connection();
        diesel::sql_query(
            "INSERT INTO subscriptions (rss_url, rss_name, users, channel) VALUES ('https://x/rss', 'Legacy', ',5,6,', 0)",
        )
        .execute(&mut conn)
        .unwrap();

        let sub = Subscription::get_by_name(&mut conn, "Legacy").unwrap().unwrap();
        assert_eq!(sub.users, vec![5, 6]);
        assert_eq!(Subscription::get_all_for_user(&mut conn, 6).unwrap().len(), 1);
    }
}

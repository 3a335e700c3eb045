use crate::db::StoreError;
use crate::schema::user_keywords;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_keywords)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct KeywordRow {
    user_id: i64,
    keywords: String,
}

/// A user's keyword rules, kept sorted and free of duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserKeywords {
    pub user_id: i64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordUpdate {
    pub added: usize,
    pub keywords: Vec<String>,
}

impl UserKeywords {
    pub fn get(conn: &mut SqliteConnection, uid: i64) -> Result<Vec<String>, StoreError> {
        use crate::schema::user_keywords::dsl::user_keywords;
        let row = user_keywords
            .find(uid)
            .select(KeywordRow::as_select())
            .first(conn)
            .optional()?;
        Ok(row.map(|r| parse_keywords(&r.keywords)).unwrap_or_default())
    }

    /// Every user with at least one rule.
    pub fn get_all(conn: &mut SqliteConnection) -> Result<HashMap<i64, Vec<String>>, StoreError> {
        use crate::schema::user_keywords::dsl::user_keywords;
        let rows = user_keywords.select(KeywordRow::as_select()).load(conn)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.user_id, parse_keywords(&row.keywords)))
            .filter(|(_, rules)| !rules.is_empty())
            .collect())
    }

    /// Split `input` on either comma form and merge the pieces into the stored set.
    /// The read and write share one write transaction so concurrent updates for
    /// the same user do not overwrite each other.
    pub fn add(conn: &mut SqliteConnection, uid: i64, input: &str) -> Result<KeywordUpdate, StoreError> {
        conn.immediate_transaction(|conn| {
            let mut set: BTreeSet<String> = UserKeywords::get(conn, uid)?.into_iter().collect();
            let added = split_input(input)
                .into_iter()
                .filter(|rule| set.insert(rule.clone()))
                .count();
            let keywords: Vec<String> = set.into_iter().collect();
            if added > 0 {
                UserKeywords::save(conn, uid, &keywords)?;
            }
            Ok(KeywordUpdate { added, keywords })
        })
    }

    /// Exact-match removal. `None` when the rule is not in the set.
    pub fn remove(
        conn: &mut SqliteConnection,
        uid: i64,
        rule: &str,
    ) -> Result<Option<Vec<String>>, StoreError> {
        conn.immediate_transaction(|conn| {
            let mut keywords = UserKeywords::get(conn, uid)?;
            let before = keywords.len();
            keywords.retain(|k| k != rule);
            if keywords.len() == before {
                return Ok(None);
            }
            UserKeywords::save(conn, uid, &keywords)?;
            Ok(Some(keywords))
        })
    }

    fn save(conn: &mut SqliteConnection, uid: i64, rules: &[String]) -> Result<(), StoreError> {
        use crate::schema::user_keywords::dsl::user_keywords;
        let row = KeywordRow {
            user_id: uid,
            keywords: serde_json::to_string(rules)?,
        };
        diesel::replace_into(user_keywords).values(&row).execute(conn)?;
        Ok(())
    }
}

/// Reads a stored JSON array, accepting a plain comma list as well.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(rules) => return rules,
            Err(e) => log::warn!("Malformed keyword list {:?}: {}", raw, e),
        }
    }
    split_input(trimmed)
}

/// Splits user input on `,` and the full-width `，`, trimming and dropping empties.
pub fn split_input(input: &str) -> Vec<String> {
    input
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_store, get_test_db_connection};
    use std::sync::Arc;

    #[test]
    fn test_split_input_handles_full_width_comma() {
        assert_eq!(
            split_input(" rust，go , ,-spam"),
            vec!["rust", "go", "-spam"]
        );
    }

    #[test]
    fn test_add_dedups_and_sorts() {
        let mut conn = get_test_db_connection();

        let first = UserKeywords::add(&mut conn, 1, "rust, ai").unwrap();
        assert_eq!(first.added, 2);
        assert_eq!(first.keywords, vec!["ai", "rust"]);

        let second = UserKeywords::add(&mut conn, 1, "ai，AI,-spam").unwrap();
        assert_eq!(second.added, 2);
        assert_eq!(second.keywords, vec!["-spam", "AI", "ai", "rust"]);

        let none = UserKeywords::add(&mut conn, 1, "rust").unwrap();
        assert_eq!(none.added, 0);
        assert_eq!(UserKeywords::get(&mut conn, 1).unwrap(), second.keywords);
    }

    #[test]
    fn test_remove_exact_match() {
        let mut conn = get_test_db_connection();
        UserKeywords::add(&mut conn, 1, "rust,ai").unwrap();

        assert_eq!(UserKeywords::remove(&mut conn, 1, "Rust").unwrap(), None);
        assert_eq!(
            UserKeywords::remove(&mut conn, 1, "rust").unwrap(),
            Some(vec!["ai".to_string()])
        );
        assert_eq!(UserKeywords::get(&mut conn, 1).unwrap(), vec!["ai"]);
    }

    #[test]
    fn test_get_all_skips_empty_sets() {
        let mut conn = get_test_db_connection();
        UserKeywords::add(&mut conn, 1, "ai").unwrap();
        UserKeywords::add(&mut conn, 2, "go").unwrap();
        UserKeywords::remove(&mut conn, 2, "go").unwrap();

        let all = UserKeywords::get_all(&mut conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&1], vec!["ai"]);
    }

    #[test]
    fn test_concurrent_adds_keep_every_rule() {
        let (_dir, store) = create_test_store();
        let store = Arc::new(store);

        let workers: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .with_conn(|conn| UserKeywords::add(conn, 1, &format!("t{t}r{i}")))
                            .expect("add keyword");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }

        let stored = store.with_conn(|conn| UserKeywords::get(conn, 1)).unwrap();
        assert_eq!(stored.len(), 200);
    }

    #[test]
    fn test_concurrent_removes_keep_other_rules() {
        let (_dir, store) = create_test_store();
        let store = Arc::new(store);
        let rules: Vec<String> = (0..40).map(|i| format!("r{i}")).collect();
        store
            .with_conn(|conn| UserKeywords::add(conn, 1, &rules.join(",")))
            .unwrap();

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in (t..20).step_by(4) {
                        let removed = store
                            .with_conn(|conn| UserKeywords::remove(conn, 1, &format!("r{i}")))
                            .expect("remove keyword");
                        assert!(removed.is_some());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }

        let mut expected: Vec<String> = (20..40).map(|i| format!("r{i}")).collect();
        expected.sort();
        let stored = store.with_conn(|conn| UserKeywords::get(conn, 1)).unwrap();
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_plain_comma_list_is_read() {
        let mut conn = get_test_db_connection();
        diesel::sql_query("INSERT INTO user_keywords (user_id, keywords) VALUES (9, 'a, b')")
            .execute(&mut conn)
            .unwrap();
        assert_eq!(UserKeywords::get(&mut conn, 9).unwrap(), vec!["a", "b"]);
    }
}

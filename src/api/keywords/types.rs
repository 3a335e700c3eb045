use serde::{Deserialize, Serialize};

/// Comma separated rules, either `,` or `，`.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeywordsAdd {
    pub keywords: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeywordRemove {
    pub keyword: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct KeywordsResponse {
    pub user_id: i64,
    pub keywords: Vec<String>,
}

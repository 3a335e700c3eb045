use super::types::Message;
use regex::RegexBuilder;

/// Returns the rules from `rules` that match `message`, in rule order.
///
/// Matching is case-insensitive over `title + " " + description`. A rule
/// starting with `-` blocks the message outright. A `*` matches any run of
/// characters, anything else is a substring test. Returned rules are trimmed
/// but keep their original case.
pub fn matches(message: &Message, rules: &[String]) -> Vec<String> {
    let corpus = format!("{} {}", message.title, message.description).to_lowercase();
    let mut matched = Vec::new();

    for raw in rules {
        let rule = raw.trim();
        if rule.is_empty() {
            continue;
        }

        if let Some(blocked) = rule.strip_prefix('-') {
            let pattern = blocked.trim().to_lowercase();
            if !pattern.is_empty() && rule_hits(&pattern, &corpus) {
                return Vec::new();
            }
            continue;
        }

        if rule_hits(&rule.to_lowercase(), &corpus) {
            matched.push(rule.to_string());
        }
    }

    matched
}

fn rule_hits(pattern: &str, corpus: &str) -> bool {
    if !pattern.contains('*') {
        return corpus.contains(pattern);
    }

    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match RegexBuilder::new(&format!("^.*{body}.*$"))
        .dot_matches_new_line(true)
        .build()
    {
        Ok(re) => re.is_match(corpus),
        Err(e) => {
            tracing::warn!(rule = pattern, error = %e, "wildcard rule did not compile");
            corpus.contains(pattern)
        }
    }
}

use super::types::Outbound;
use crate::models::subscription::Subscription;
use crate::tasks::feed_monitor::types::Message;
use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Times are shown in UTC+8.
const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Private-use characters stand in for allowed tags while everything else is stripped.
const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';
const HREF: char = '\u{E002}';

const ALLOWED_TAGS: [&str; 6] = ["b", "i", "u", "s", "code", "pre"];

static IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).expect("valid regex"));
static BARE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s"']+\.(jpg|jpeg|png|gif|webp)"#).expect("valid regex")
});
static TELEGRAM_CDN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://cdn[0-9]*\.cdn-telegram\.org/[^\s"']+"#).expect("valid regex")
});

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img[^>]*>").expect("valid regex"));
static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static ANCHOR_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s+href=["']([^"']+)["'][^>]*>"#).expect("valid regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static PLACEHOLDER_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\u{E000}(/?)(b|i|u|s|code|pre|a)\u{E001}").expect("valid regex")
});
static PLACEHOLDER_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}a\u{E002}([^\u{E001}]*)\u{E001}").expect("valid regex"));

/// What to send to the subscriber, and the plain summary mirrored for the admin.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub primary: Outbound,
    pub summary: String,
}

pub fn compose(sub: &Subscription, message: &Message, matched: &[String]) -> Notification {
    let codes = format_keywords(matched);
    let time = format_timestamp(message.published_at);

    if sub.channel {
        let body = sanitize_html(&message.description);
        let feed = html_escape::encode_text(&sub.name);
        let caption = format!("👋 {feed}: {codes}\n🕒 {time}\n{body}\n");
        let plain_body = ANY_TAG.replace_all(&body, "");
        let summary = format!("👋 {}\n🕒 {}\n{}", sub.name, time, plain_body);
        let primary = match extract_image_url(&message.description) {
            Some(url) => Outbound::Photo { url, caption },
            None => Outbound::Text(caption),
        };
        Notification { primary, summary }
    } else {
        let title = html_escape::encode_text(&message.title);
        let text = format!(
            "📌 {title}\n🔖 Keywords: {codes}\n🕒 {time}\n🔗 {}",
            message.link
        );
        let summary = format!("📌 {}\n🕒 {}\n🔗 {}", message.title, time, message.link);
        Notification {
            primary: Outbound::Text(text),
            summary,
        }
    }
}

pub fn format_keywords(matched: &[String]) -> String {
    matched
        .iter()
        .map(|rule| format!("<code>{}</code>", html_escape::encode_text(rule)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(offset) => time.with_timezone(&offset).format(TIME_FORMAT).to_string(),
        None => time.format(TIME_FORMAT).to_string(),
    }
}

/// First `<img src>`, else the first bare image URL, else the first Telegram
/// CDN URL.
pub fn extract_image_url(html: &str) -> Option<String> {
    if let Some(src) = IMG_SRC.captures(html).and_then(|c| c.get(1)) {
        return Some(src.as_str().to_string());
    }
    BARE_IMAGE
        .find(html)
        .or_else(|| TELEGRAM_CDN.find(html))
        .map(|m| m.as_str().to_string())
}

/// Reduce HTML to the subset Telegram accepts: b, i, u, s, code, pre and
/// `a href`. Images are dropped, `<br>` becomes a newline and every other tag
/// is removed while its text is kept.
pub fn sanitize_html(html: &str) -> String {
    let text = html.replace([OPEN, CLOSE, HREF], "");
    let text = IMG_TAG.replace_all(&text, "");
    let mut text = BR_TAG.replace_all(&text, "\n").into_owned();

    for tag in ALLOWED_TAGS {
        text = text
            .replace(&format!("<{tag}>"), &format!("{OPEN}{tag}{CLOSE}"))
            .replace(&format!("</{tag}>"), &format!("{OPEN}/{tag}{CLOSE}"));
    }
    let text = ANCHOR_OPEN.replace_all(&text, format!("{OPEN}a{HREF}${{1}}{CLOSE}").as_str());
    let text = text.replace("</a>", &format!("{OPEN}/a{CLOSE}"));

    let text = ANY_TAG.replace_all(&text, "");
    let text = PLACEHOLDER_ANCHOR.replace_all(&text, "<a href=\"${1}\">");
    let text = PLACEHOLDER_TAG.replace_all(&text, "<${1}${2}>");
    EXTRA_NEWLINES.replace_all(&text, "\n\n").into_owned()
}

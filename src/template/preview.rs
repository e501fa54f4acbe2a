//! Preview preparation and reverse extraction of values from rendered pages.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

lazy_static! {
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?s)<script>(.*?)</script>").unwrap();
    static ref TITLE_REGEX: Regex = Regex::new(r"<title>(.*?)</title>").unwrap();
    static ref KEYWORDS_REGEX: Regex =
        Regex::new(r#"<meta name="keywords" content="(.*?)""#).unwrap();
    static ref DESCRIPTION_REGEX: Regex =
        Regex::new(r#"<meta name="description" content="(.*?)""#).unwrap();
    static ref REDIRECT_URL_REGEX: Regex =
        Regex::new(r"window\.location\.href = '(.*?)'").unwrap();
    static ref REDIRECT_SECONDS_REGEX: Regex =
        Regex::new(r"setTimeout\(function\(\) \{[^}]*\}, (\d+)\*1000\)").unwrap();
}

/// Make a template viewable from the console.
///
/// Relative stylesheet and image references are pointed at the embedded
/// assets under `{base_url}/templates/`, and the auto-redirect script is removed
/// so the preview does not navigate away.
pub fn prepare_preview(html: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');

    let rewritten = html
        .replace(r#"href="css/"#, &format!(r#"href="{}/templates/css/"#, base))
        .replace(r#"src="images/"#, &format!(r#"src="{}/templates/images/"#, base))
        .replace(r#"href="images/"#, &format!(r#"href="{}/templates/images/"#, base));

    SCRIPT_REGEX
        .replace_all(&rewritten, |caps: &Captures| {
            if caps[1].contains("setTimeout") {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Recover editable values from a rendered page
pub fn extract_placeholders(html: &str) -> Map<String, Value> {
    let mut values = Map::new();

    let captures = [
        ("SERVICE_NAME", &*TITLE_REGEX),
        ("META_KEYWORDS", &*KEYWORDS_REGEX),
        ("META_DESCRIPTION", &*DESCRIPTION_REGEX),
        ("REDIRECT_URL", &*REDIRECT_URL_REGEX),
    ];
    for (key, regex) in captures {
        if let Some(caps) = regex.captures(html) {
            values.insert(key.to_string(), Value::from(&caps[1]));
        }
    }

    if let Some(seconds) = REDIRECT_SECONDS_REGEX
        .captures(html)
        .and_then(|caps| caps[1].parse::<u64>().ok())
    {
        values.insert("REDIRECT_SECONDS".to_string(), Value::from(seconds));
    }

    values
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::{FetchError, ItemReference, Record};
use scraper::{Html, Selector};

use crate::decode::decode_html;
use crate::discover::DetailFetcher;
use crate::http::HttpClient;

/// Fetches an event detail page and extracts its fields.
pub struct EventPageFetcher {
    http: HttpClient,
}

impl EventPageFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DetailFetcher for EventPageFetcher {
    async fn fetch(&self, item: &ItemReference) -> Result<Record, FetchError> {
        let body = self.http.get_page(&item.locator).await?;
        let html = decode_html(&body)?;
        parse_event_page(&html, item, Utc::now())
    }
}

/// Event page extraction:
/// - title from `<title>` (required)
/// - body from `<meta name="description">`
/// - media from the first `og:image` / `twitter:image` meta tag
/// - `date` and `time` from the lines of `#fecha-evento`
/// - `location` from `#sede-evento`
pub fn parse_event_page(
    html: &str,
    item: &ItemReference,
    fetched_at: DateTime<Utc>,
) -> Result<Record, FetchError> {
    let doc = Html::parse_document(html);

    let title = select_text(&doc, "title")
        .ok_or_else(|| FetchError::malformed(format!("{} has no title", item.locator)))?;

    let mut record = Record::new(item.id.clone(), title, fetched_at);
    record.url = Some(item.locator.clone());
    record.body = select_attr(&doc, r#"meta[name="description"]"#, "content").unwrap_or_default();
    record.media_url = select_attr(
        &doc,
        r#"meta[property="og:image"], meta[property="twitter:image"], meta[name="twitter:image"]"#,
        "content",
    );

    if let Some(lines) = select_lines(&doc, "#fecha-evento") {
        let mut lines = lines.into_iter();
        if let Some(date) = lines.next() {
            record.fields.insert("date".to_string(), date);
        }
        if let Some(time) = lines.next() {
            record.fields.insert("time".to_string(), clean_time(&time));
        }
    }
    if let Some(location) = select_text(&doc, "#sede-evento") {
        record.fields.insert("location".to_string(), location);
    }

    Ok(record)
}

/// "De 13:00 a 15:00 h" -> "13:00 a 15:00"
fn clean_time(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("De ").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(" h").unwrap_or(trimmed);
    trimmed.trim().to_string()
}

fn selector(raw: &str) -> Option<Selector> {
    Selector::parse(raw).ok()
}

fn select_text(doc: &Html, raw: &str) -> Option<String> {
    let sel = selector(raw)?;
    let node = doc.select(&sel).next()?;
    let text = node.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn select_attr(doc: &Html, raw: &str, attr: &str) -> Option<String> {
    let sel = selector(raw)?;
    doc.select(&sel)
        .filter_map(|node| node.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Non-empty text lines of an element; `<br>` separates lines.
fn select_lines(doc: &Html, raw: &str) -> Option<Vec<String>> {
    let sel = selector(raw)?;
    let node = doc.select(&sel).next()?;
    let lines: Vec<String> = node
        .text()
        .flat_map(|chunk| chunk.lines())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    (!lines.is_empty()).then_some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"<html><head>
        <title>Conferencia de Economía</title>
        <meta name="description" content="Charla sobre política monetaria.">
        <meta property="og:image" content="https://eventos.example.mx/img/poster.jpg">
        </head><body>
        <div id="fecha-evento">Miércoles 20 de noviembre de 2024<br>De 13:00 a 15:00 h</div>
        <div id="sede-evento">
            Auditorio Raúl Baillères
        </div>
        </body></html>"#;

    #[test]
    fn extracts_event_fields() {
        let item = ItemReference::link("https://eventos.example.mx/es/evento/1");
        let record = parse_event_page(EVENT, &item, Utc::now()).unwrap();
        assert_eq!(record.title, "Conferencia de Economía");
        assert_eq!(record.body, "Charla sobre política monetaria.");
        assert_eq!(
            record.media_url.as_deref(),
            Some("https://eventos.example.mx/img/poster.jpg")
        );
        assert_eq!(record.field("date"), Some("Miércoles 20 de noviembre de 2024"));
        assert_eq!(record.field("time"), Some("13:00 a 15:00"));
        assert_eq!(record.field("location"), Some("Auditorio Raúl Baillères"));
        assert_eq!(record.url.as_deref(), Some(item.locator.as_str()));
    }

    #[test]
    fn missing_title_is_malformed() {
        let item = ItemReference::link("https://eventos.example.mx/es/evento/2");
        let err = parse_event_page("<html><body>nothing</body></html>", &item, Utc::now())
            .unwrap_err();
        assert_eq!(err.kind, harvester_core::FailureKind::Malformed);
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let item = ItemReference::link("https://eventos.example.mx/es/evento/3");
        let record =
            parse_event_page("<html><head><title>T</title></head></html>", &item, Utc::now())
                .unwrap();
        assert_eq!(record.body, "");
        assert!(record.media_url.is_none());
        assert!(record.fields.is_empty());
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use super::{ClientError, PageScraper, PageSummary};

const MAX_HEADINGS: usize = 8;

/// Fetches a public page and keeps the bits useful as generation context.
#[derive(Clone)]
pub struct HttpPageScraper {
    client: Client,
}

impl HttpPageScraper {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("ReviewBoost/0.1 (+https://reviewboost.app)")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageScraper for HttpPageScraper {
    async fn summarize(&self, url: &str) -> Result<PageSummary, ClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let html = response.text().await?;
        log::debug!("Fetched {} bytes from {url}", html.len());
        extract_summary(&html)
    }
}

fn selector(css: &str) -> Result<Selector, ClientError> {
    Selector::parse(css).map_err(|e| ClientError::InvalidResponse(format!("selector {css}: {e}")))
}

fn clean(text: impl Iterator<Item = impl AsRef<str>>) -> Option<String> {
    let joined = text
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

pub fn extract_summary(html: &str) -> Result<PageSummary, ClientError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .and_then(|el| clean(el.text()));

    let description = document
        .select(&selector(r#"meta[name="description"], meta[property="og:description"]"#)?)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| clean(std::iter::once(content)));

    let headings = document
        .select(&selector("h1, h2")?)
        .filter_map(|el| clean(el.text()))
        .take(MAX_HEADINGS)
        .collect();

    Ok(PageSummary {
        title,
        description,
        headings,
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <title>  Blue Door
     Bakery </title>
  <meta name="description" content="Sourdough and pastries baked daily.">
</head><body>
  <h1>Fresh every morning</h1>
  <h2>Our <em>ovens</em></h2>
  <h3>ignored</h3>
</body></html>"#;

    #[test]
    fn extracts_title_description_and_headings() {
        let summary = extract_summary(PAGE).unwrap();
        assert_eq!(summary.title.as_deref(), Some("Blue Door Bakery"));
        assert_eq!(
            summary.description.as_deref(),
            Some("Sourdough and pastries baked daily.")
        );
        assert_eq!(summary.headings, vec!["Fresh every morning", "Our ovens"]);
    }

    #[test]
    fn empty_page_yields_empty_summary() {
        assert_eq!(extract_summary("").unwrap(), PageSummary::default());
    }

    #[tokio::test]
    async fn fetches_and_summarizes_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let scraper = HttpPageScraper::new(Duration::from_secs(5)).unwrap();
        let summary = scraper.summarize(&format!("{}/", server.uri())).await.unwrap();
        assert_eq!(summary.headings.len(), 2);
    }

    #[tokio::test]
    async fn missing_page_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scraper = HttpPageScraper::new(Duration::from_secs(5)).unwrap();
        let err = scraper.summarize(&server.uri()).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }
}

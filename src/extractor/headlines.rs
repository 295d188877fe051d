use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};

use crate::model::Product;

use super::dom::text_of;

const MAX_HEADINGS: usize = 10;
const MIN_NAME_CHARS: usize = 5;
const TAGLINE_MAX_CHARS: usize = 200;

/// Low-confidence fallback for pages without product containers: the first
/// ten h1-h4 headings, each paired with the next p/div after it.
pub fn extract_headlines_at(html: &str, source_url: &str, at: DateTime<Utc>) -> Vec<Product> {
    let doc = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = doc.root_element().descendants().filter_map(ElementRef::wrap).collect();

    let headings = elements
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e.value().name(), "h1" | "h2" | "h3" | "h4"))
        .take(MAX_HEADINGS);

    let mut out = Vec::new();
    for (idx, heading) in headings {
        let name = text_of(*heading);
        if name.chars().count() <= MIN_NAME_CHARS { continue; }

        let tagline = elements[idx + 1..]
            .iter()
            .find(|e| matches!(e.value().name(), "p" | "div"))
            .map(|e| text_of(*e).chars().take(TAGLINE_MAX_CHARS).collect::<String>())
            .filter(|t| !t.is_empty());

        let mut p = Product::new(name, source_url, at);
        if let Some(t) = tagline { p.tagline = t; }
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TAGLINE_DEFAULT;

    #[test]
    fn pairs_headings_with_next_block() {
        let html = r#"<html><body>
            <h1>Launch Day Roundup</h1><p>Everything that shipped today</p>
            <h2>Tiny</h2><p>filtered out</p>
            <h3>Another Product</h3>
            <section><div>Nested description</div></section>
        </body></html>"#;
        let got = extract_headlines_at(html, "https://s.test/", Utc::now());
        let pairs: Vec<(&str, &str)> = got.iter().map(|p| (p.name.as_str(), p.tagline.as_str())).collect();
        assert_eq!(pairs, vec![
            ("Launch Day Roundup", "Everything that shipped today"),
            ("Another Product", "Nested description"),
        ]);
    }

    #[test]
    fn caps_at_ten_headings_before_filtering() {
        let mut html = String::from("<html><body>");
        for i in 0..12 { html.push_str(&format!("<h2>Heading number {}</h2>", i)); }
        html.push_str("</body></html>");
        let got = extract_headlines_at(&html, "https://s.test/", Utc::now());
        assert_eq!(got.len(), 10);
        assert_eq!(got[9].name, "Heading number 9");
        assert_eq!(got[0].tagline, TAGLINE_DEFAULT);
    }

    #[test]
    fn tagline_truncated_to_200_chars() {
        let long = "x".repeat(500);
        let html = format!("<h4>Long Tagline Product</h4><p>{}</p>", long);
        let got = extract_headlines_at(&html, "https://s.test/", Utc::now());
        assert_eq!(got[0].tagline.chars().count(), 200);
        assert_eq!(got[0].source_url, "https://s.test/");
    }
}

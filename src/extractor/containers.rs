use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::dom::{class_contains, sel};

static PRODUCT_ITEM: LazyLock<Selector> = LazyLock::new(|| sel(r#"div[data-test="product-item"]"#));
static CLASSED_DIV: LazyLock<Selector> = LazyLock::new(|| sel("div[class]"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| sel("article"));

pub type Stage = for<'a> fn(&'a Html) -> Vec<ElementRef<'a>>;

/// Container strategies, most specific first. The first stage that finds
/// anything wins; later stages are never consulted.
pub const STAGES: [(&str, Stage); 4] = [
    ("product_marker", by_marker as Stage),
    ("product_class", by_product_class as Stage),
    ("article", by_article as Stage),
    ("card_class", by_card_class as Stage),
];

pub fn locate(doc: &Html) -> Vec<ElementRef<'_>> {
    for (name, stage) in STAGES.iter() {
        let found = stage(doc);
        if !found.is_empty() {
            debug!(stage = *name, count = found.len(), "containers located");
            return found;
        }
    }
    Vec::new()
}

pub fn by_marker(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&PRODUCT_ITEM).collect()
}

pub fn by_product_class(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&CLASSED_DIV).filter(|e| class_contains(*e, &["product"])).collect()
}

pub fn by_article(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&ARTICLE).collect()
}

pub fn by_card_class(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&CLASSED_DIV).filter(|e| class_contains(*e, &["card", "item", "post"])).collect()
}

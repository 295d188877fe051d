use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use crate::model::Product;

use super::dom::{first_text, resolve, sel, text_of, Probe};

static H2: LazyLock<Selector> = LazyLock::new(|| sel("h2"));
static H3: LazyLock<Selector> = LazyLock::new(|| sel("h3"));
static A: LazyLock<Selector> = LazyLock::new(|| sel("a"));
static A_HREF: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static DIV: LazyLock<Selector> = LazyLock::new(|| sel("div"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| sel("span"));
static P: LazyLock<Selector> = LazyLock::new(|| sel("p"));
static IMG: LazyLock<Selector> = LazyLock::new(|| sel("img"));

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("static regex"));

pub static NAME_PROBES: [Probe; 4] = [
    Probe { sel: &H3, class_has: &[] },
    Probe { sel: &H2, class_has: &[] },
    Probe { sel: &A, class_has: &["name"] },
    Probe { sel: &DIV, class_has: &["title"] },
];

pub static TAGLINE_PROBES: [Probe; 2] = [
    Probe { sel: &P, class_has: &[] },
    Probe { sel: &DIV, class_has: &["tagline", "description", "subtitle"] },
];

pub static VOTE_PROBES: [Probe; 2] = [
    Probe { sel: &SPAN, class_has: &["vote"] },
    Probe { sel: &DIV, class_has: &["vote"] },
];

pub static COMMENT_PROBES: [Probe; 2] = [
    Probe { sel: &SPAN, class_has: &["comment"] },
    Probe { sel: &DIV, class_has: &["comment"] },
];

/// Builds a product from one container. `None` only when no name is found;
/// every other field degrades to its default.
pub fn product_from(item: ElementRef<'_>, source_url: &str, base: Option<&Url>, at: DateTime<Utc>) -> Option<Product> {
    let name = first_text(item, &NAME_PROBES)?;
    let mut p = Product::new(name, source_url, at);

    if let Some(t) = first_text(item, &TAGLINE_PROBES) { p.tagline = t; }
    p.url = item
        .select(&A_HREF)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|h| resolve(h, base));
    p.votes = Some(count_of(item, &VOTE_PROBES));
    p.comments = Some(count_of(item, &COMMENT_PROBES));
    p.image_url = item
        .select(&IMG)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|s| resolve(s, base));

    Some(p)
}

/// Number in the first element a probe finds; 0 when there is no element or no digits.
pub fn count_of(item: ElementRef<'_>, probes: &[Probe]) -> i32 {
    probes
        .iter()
        .find_map(|p| p.first(item))
        .map(|el| first_number(&text_of(el)))
        .unwrap_or(0)
}

/// First contiguous run of ASCII digits. Saturates at `i32::MAX`.
pub fn first_number(text: &str) -> i32 {
    match DIGITS.find(text) {
        Some(m) => m.as_str().parse::<u64>().map(|n| n.min(i32::MAX as u64) as i32).unwrap_or(i32::MAX),
        None => 0,
    }
}

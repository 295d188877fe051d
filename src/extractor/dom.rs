use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use url::Url;

pub fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector must parse")
}

/// Visible text with whitespace runs collapsed to single spaces.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring test against the whole `class` attribute.
pub fn class_contains(el: ElementRef<'_>, needles: &[&str]) -> bool {
    match el.value().attr("class") {
        Some(c) => {
            let c = c.to_lowercase();
            needles.iter().any(|n| c.contains(n))
        }
        None => false,
    }
}

/// One "find the first X inside the container" step.
/// `class_has` empty means any element matching `sel`.
pub struct Probe {
    pub sel: &'static LazyLock<Selector>,
    pub class_has: &'static [&'static str],
}

impl Probe {
    pub fn first<'a>(&self, item: ElementRef<'a>) -> Option<ElementRef<'a>> {
        item.select(self.sel).find(|e| self.class_has.is_empty() || class_contains(*e, self.class_has))
    }
}

/// First probe that yields an element with non-empty text.
pub fn first_text(item: ElementRef<'_>, probes: &[Probe]) -> Option<String> {
    probes
        .iter()
        .filter_map(|p| p.first(item))
        .map(text_of)
        .find(|t| !t.is_empty())
}

/// Absolute hrefs pass through, root-relative ones are joined onto the page URL.
/// Anything else (`../x`, `x.html`, `#frag`) is not resolved.
pub fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.starts_with("http") {
        Some(href.to_string())
    } else if href.starts_with('/') {
        base?.join(href).ok().map(|u| u.to_string())
    } else {
        None
    }
}

use scraper::{ElementRef, Selector};

use crate::crawler::models::RawListing;

pub mod olx;
pub mod otodom;
pub mod trojmiasto;

/// Site-specific extraction: turns fetched page HTML into raw field
/// tuples and pagination hints. Implementations stay mechanical. Raw
/// text passes through untouched and normalization happens in
/// `Listing::build`.
pub trait Extractor: Send + Sync {
    /// Tag stored with every row from this source (the `page` column).
    fn tag(&self) -> &'static str;

    /// First page number the site serves.
    fn first_page(&self) -> u32 {
        1
    }

    /// Highest page number advertised by the pagination widget, 1 when
    /// no markers are found.
    fn max_page(&self, html: &str) -> u32;

    /// Raw field strings for every listing card on the page, in order.
    fn listings(&self, html: &str) -> Vec<RawListing>;
}

pub fn all() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(otodom::Otodom),
        Box::new(trojmiasto::Trojmiasto),
        Box::new(olx::Olx),
    ]
}

fn text_of(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn href_of(card: &ElementRef<'_>, selector: &Selector, base: &str) -> Option<String> {
    let href = card
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("href"))?;

    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else {
        Some(format!("{}{}", base, href))
    }
}

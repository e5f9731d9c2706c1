use scraper::{Html, Selector};

use super::{href_of, text_of, Extractor};
use crate::crawler::models::RawListing;

pub struct Olx;

impl Extractor for Olx {
    fn tag(&self) -> &'static str {
        "olx"
    }

    fn max_page(&self, html: &str) -> u32 {
        let document = Html::parse_document(html);
        let selector = Selector::parse(r#"li[data-testid="pagination-list-item"]"#).unwrap();

        document
            .select(&selector)
            .filter_map(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
            .max()
            .unwrap_or(1)
    }

    fn listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let card = Selector::parse("div.css-l9drzq").unwrap();
        let title = Selector::parse("h4.css-1s3qyje").unwrap();
        let price = Selector::parse(r#"p[data-testid="ad-price"]"#).unwrap();
        let location = Selector::parse("p.css-1mwdrlh").unwrap();
        let area = Selector::parse("span.css-1cd0guq").unwrap();
        let link = Selector::parse("a").unwrap();

        document
            .select(&card)
            .map(|listing| {
                let (city, district) = split_location(text_of(&listing, &location));
                RawListing {
                    title: text_of(&listing, &title),
                    price: text_of(&listing, &price),
                    city,
                    district,
                    area: text_of(&listing, &area),
                    url: href_of(&listing, &link, "https://www.olx.pl"),
                }
            })
            .collect()
    }
}

// "Gdańsk, Wrzeszcz - Odświeżono dnia ..." -> ("Gdańsk", "Wrzeszcz")
fn split_location(location: Option<String>) -> (Option<String>, Option<String>) {
    let location = match location {
        Some(l) => l,
        None => return (None, None),
    };
    let location = location.split('-').next().unwrap_or("").trim();

    let mut parts = location.splitn(2, ", ");
    let city = parts.next().map(str::to_string).filter(|s| !s.is_empty());
    let district = parts.next().map(|s| s.trim().to_string());

    (city, district)
}

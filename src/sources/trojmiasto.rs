use scraper::{Html, Selector};

use super::{href_of, text_of, Extractor};
use crate::crawler::models::RawListing;

pub struct Trojmiasto;

impl Extractor for Trojmiasto {
    fn tag(&self) -> &'static str {
        "trojmiasto"
    }

    fn max_page(&self, html: &str) -> u32 {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a.pages__controls__last").unwrap();

        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("data-page-number"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(1)
    }

    fn listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let card = Selector::parse("div.list__item").unwrap();
        let title = Selector::parse("a.list__item__content__title__name").unwrap();
        let price = Selector::parse("p.list__item__price__value").unwrap();
        let location = Selector::parse("p.list__item__content__subtitle").unwrap();
        let area = Selector::parse(
            "li.details--icons--element--powierzchnia p.list__item__details__icons__element__desc",
        )
        .unwrap();

        document
            .select(&card)
            .map(|listing| {
                // The title lives in the anchor's title attribute, not its text.
                let title_text = listing
                    .select(&title)
                    .next()
                    .and_then(|el| el.value().attr("title"))
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                let (city, district) = split_location(text_of(&listing, &location));

                RawListing {
                    title: title_text,
                    price: text_of(&listing, &price),
                    city,
                    district,
                    area: text_of(&listing, &area),
                    url: href_of(&listing, &title, "https://ogloszenia.trojmiasto.pl"),
                }
            })
            .collect()
    }
}

// "Gdynia Orłowo, al. Zwycięstwa" -> ("Gdynia", "Orłowo")
fn split_location(location: Option<String>) -> (Option<String>, Option<String>) {
    let location = match location {
        Some(l) => l,
        None => return (None, None),
    };
    let location = location.split(',').next().unwrap_or("").trim();

    let mut parts = location.splitn(2, ' ');
    let city = parts.next().map(str::to_string).filter(|s| !s.is_empty());
    let district = parts.next().map(str::to_string);

    (city, district)
}

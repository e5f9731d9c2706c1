use scraper::{Html, Selector};

use super::{href_of, text_of, Extractor};
use crate::crawler::models::RawListing;

pub struct Otodom;

impl Extractor for Otodom {
    fn tag(&self) -> &'static str {
        "otodom"
    }

    fn max_page(&self, html: &str) -> u32 {
        let document = Html::parse_document(html);
        let selector = Selector::parse("li.css-43nhzf").unwrap();

        document
            .select(&selector)
            .filter_map(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
            .max()
            .unwrap_or(1)
    }

    fn listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let card = Selector::parse("article.css-136g1q2").unwrap();
        let title = Selector::parse("p.css-u3orbr").unwrap();
        let price = Selector::parse("span.css-2bt9f1").unwrap();
        let location = Selector::parse("p.css-42r2ms").unwrap();
        let details = Selector::parse("dl.css-12dsp7a").unwrap();
        let dt = Selector::parse("dt").unwrap();
        let dd = Selector::parse("dd").unwrap();
        let link = Selector::parse("a").unwrap();

        document
            .select(&card)
            .map(|listing| {
                let (city, district) = split_location(text_of(&listing, &location));

                // The details list pairs labels with values; the area sits
                // under "Powierzchnia".
                let area = listing.select(&details).next().and_then(|dl| {
                    dl.select(&dt)
                        .zip(dl.select(&dd))
                        .find(|(label, _)| {
                            label.text().collect::<String>().trim() == "Powierzchnia"
                        })
                        .map(|(_, value)| value.text().collect::<String>().trim().to_string())
                });

                RawListing {
                    title: text_of(&listing, &title),
                    price: text_of(&listing, &price),
                    city,
                    district,
                    area,
                    url: href_of(&listing, &link, "https://www.otodom.pl"),
                }
            })
            .collect()
    }
}

// Location lines read "Wrzeszcz, Gdańsk, pomorskie", with street-prefixed
// variants like "ul. Długa, Wrzeszcz, Gdańsk, pomorskie".
fn split_location(location: Option<String>) -> (Option<String>, Option<String>) {
    let location = match location {
        Some(l) => l,
        None => return (None, None),
    };
    let parts: Vec<&str> = location.split(", ").collect();

    let (district, city) = if location.to_lowercase().starts_with("ul.") {
        match parts.as_slice() {
            [_, district, city, _] => (Some(*district), Some(*city)),
            _ => (None, None),
        }
    } else {
        match parts.as_slice() {
            [district, city, _] => (Some(*district), Some(*city)),
            _ => (None, None),
        }
    };

    (city.map(str::to_string), district.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <article class="css-136g1q2">
            <a href="/pl/oferta/mieszkanie-ID2"></a>
            <p class="css-u3orbr e1g5xnx10">Apartament z widokiem</p>
            <span class="css-2bt9f1 evk7nst0">780 000 zł</span>
            <p class="css-42r2ms eejmx80">Przymorze, Gdańsk, pomorskie</p>
            <dl class="css-12dsp7a">
                <dt>Liczba pokoi</dt><dd>3</dd>
                <dt>Powierzchnia</dt><dd>61 m²</dd>
            </dl>
        </article>
        <article class="css-136g1q2">
            <p class="css-u3orbr">Dom przy ulicy</p>
            <span class="css-2bt9f1">1 200 000 zł</span>
            <p class="css-42r2ms">ul. Morska, Orłowo, Gdynia, pomorskie</p>
        </article>
        <ul>
            <li class="css-43nhzf">1</li>
            <li class="css-43nhzf">12</li>
            <li class="css-43nhzf">3</li>
        </ul>
        </body></html>
    "#;

    #[test]
    fn extracts_title_price_location_and_area() {
        let listings = Otodom.listings(PAGE);
        assert_eq!(listings.len(), 2);

        assert_eq!(listings[0].title.as_deref(), Some("Apartament z widokiem"));
        assert_eq!(listings[0].price.as_deref(), Some("780 000 zł"));
        assert_eq!(listings[0].city.as_deref(), Some("Gdańsk"));
        assert_eq!(listings[0].district.as_deref(), Some("Przymorze"));
        assert_eq!(listings[0].area.as_deref(), Some("61 m²"));
        assert_eq!(
            listings[0].url.as_deref(),
            Some("https://www.otodom.pl/pl/oferta/mieszkanie-ID2")
        );
    }

    #[test]
    fn street_prefixed_location_skips_the_street_part() {
        let listings = Otodom.listings(PAGE);
        assert_eq!(listings[1].city.as_deref(), Some("Gdynia"));
        assert_eq!(listings[1].district.as_deref(), Some("Orłowo"));
        // No details list on this card.
        assert_eq!(listings[1].area, None);
    }

    #[test]
    fn max_page_scans_pagination_items() {
        assert_eq!(Otodom.max_page(PAGE), 12);
        assert_eq!(Otodom.max_page("<html></html>"), 1);
    }
}

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        "otodom",
        "https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/pomorskie/{city}?page=",
    ),
    (
        "trojmiasto",
        "https://ogloszenia.trojmiasto.pl/nieruchomosci/{city}/ikl,101_106,wi,100_200_230_250_260_220_240_210.html?page=",
    ),
    (
        "olx",
        "https://www.olx.pl/nieruchomosci/mieszkania/sprzedaz/{city}/?page=",
    ),
];

pub struct Config {
    pub database_url: String,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
    pub politeness: Duration,
    pub cities: Vec<String>,
    // Source tag -> listing page URL template with a {city} placeholder.
    pub url_templates: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut url_templates = HashMap::new();
        for (source, default) in DEFAULT_TEMPLATES {
            let key = format!("{}_URL", source.to_uppercase());
            let template = env::var(&key).unwrap_or_else(|_| (*default).to_string());
            url_templates.insert((*source).to_string(), template);
        }

        let cities = env::var("CITIES")
            .unwrap_or_else(|_| "gdansk,sopot,gdynia".to_string())
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:listings.db".to_string()),
            max_retries: env_parse("MAX_RETRIES", 5)?,
            initial_backoff: Duration::from_secs(env_parse("INITIAL_BACKOFF_SECS", 5)?),
            backoff_factor: env_parse("BACKOFF_FACTOR", 2)?,
            politeness: Duration::from_millis(env_parse("PAGE_DELAY_MS", 500)?),
            cities,
            url_templates,
        })
    }

    /// Expands a source's URL template for every configured city.
    pub fn base_urls(&self, source: &str) -> Vec<(String, String)> {
        let template = match self.url_templates.get(source) {
            Some(t) => t,
            None => return Vec::new(),
        };

        self.cities
            .iter()
            .map(|city| (city.clone(), template.replace("{city}", city)))
            .collect()
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {}", key)),
        Err(_) => Ok(default),
    }
}

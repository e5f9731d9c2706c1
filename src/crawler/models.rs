use once_cell::sync::Lazy;
use regex::Regex;

// Currency / unit markers stripped before numeric parsing. `\s` also
// covers the NBSP thousands separators the sites emit.
static PRICE_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s|zł|pln").unwrap());
static AREA_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s|m²|m2").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid price format: {0:?}")]
    Price(String),
    #[error("price cannot be negative: {0:?}")]
    NegativePrice(String),
    #[error("invalid area format: {0:?}")]
    Area(String),
    #[error("area must be positive: {0:?}")]
    NonPositiveArea(String),
}

/// Raw field strings exactly as a site extractor handed them over,
/// before any normalization.
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub title: Option<String>,
    pub price: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub area: Option<String>,
    pub url: Option<String>,
}

/// One normalized listing. Construction via `build` is the only way in,
/// so a value of this type always satisfies the field invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub area: Option<f64>,
    pub url: Option<String>,
}

impl Listing {
    pub fn build(raw: RawListing) -> Result<Self, ValidationError> {
        Ok(Self {
            title: clean_text(raw.title),
            price: parse_price(raw.price)?,
            city: clean_text(raw.city),
            district: clean_text(raw.district),
            area: parse_area(raw.area)?,
            url: clean_text(raw.url),
        })
    }

    /// Title as it participates in the `(source, title)` identity.
    pub fn identity_title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_price(value: Option<String>) -> Result<Option<i64>, ValidationError> {
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(None),
    };

    let cleaned = PRICE_MARKERS.replace_all(&raw, "").replace(',', ".");
    let parsed: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::Price(raw.clone()))?;
    // "NaN" and "inf" survive marker stripping and parse as floats.
    if !parsed.is_finite() {
        return Err(ValidationError::Price(raw));
    }
    let price = parsed.trunc() as i64;
    if price < 0 {
        return Err(ValidationError::NegativePrice(raw));
    }

    Ok(Some(price))
}

fn parse_area(value: Option<String>) -> Result<Option<f64>, ValidationError> {
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(None),
    };

    let cleaned = AREA_MARKERS.replace_all(&raw, "").replace(',', ".");
    let area: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::Area(raw.clone()))?;
    if !area.is_finite() {
        return Err(ValidationError::Area(raw));
    }
    if area <= 0.0 {
        return Err(ValidationError::NonPositiveArea(raw));
    }

    Ok(Some(area))
}

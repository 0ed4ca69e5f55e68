use crate::mappings::{CityMapping, CountryMapping};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

/// Deterministic ASCII transliteration: NFKD decomposition, strip combining
/// marks, then map the handful of Latin letters that do not decompose.
/// External weather APIs are ASCII/Latin-script sensitive, so all
/// name-munging policy lives here and the enrichment stage stays
/// declarative.
pub fn transliterate(input: &str) -> String {
    let decomposed: String = input.nfkd().collect();
    let mut out = String::with_capacity(decomposed.len());
    for c in decomposed.chars() {
        if unicode_normalization::char::is_combining_mark(c) {
            continue;
        }
        match c {
            'ß' => out.push_str("ss"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'đ' => out.push('d'),
            'Đ' => out.push('D'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            _ => out.push(c),
        }
    }
    out
}

/// Maps free-text country and city names onto canonical codes/spellings
/// using the configured lookup tables, with transliteration as fallback.
pub struct NameNormalizer<'a> {
    countries: &'a CountryMapping,
    cities: &'a CityMapping,
}

impl<'a> NameNormalizer<'a> {
    pub fn new(countries: &'a CountryMapping, cities: &'a CityMapping) -> Self {
        Self { countries, cities }
    }

    /// Resolve a free-text country name to its 2-letter code.
    ///
    /// Trims and lowercases the input, exact-matches the mapping, then
    /// retries with the transliterated key. An unresolvable name returns
    /// `None` rather than an error; the mapping table needs an update.
    pub fn resolve_country_code(&self, country_name: &str) -> Option<&'a str> {
        let key = country_name.trim().to_lowercase();
        if key.is_empty() {
            warn!("Invalid or missing country name: {:?}", country_name);
            return None;
        }
        let code = self
            .countries
            .get(&key)
            .or_else(|| self.countries.get(&transliterate(&key)));
        if code.is_none() {
            warn!(
                "Unknown country: '{}' -- please update the country code mapping",
                country_name
            );
        }
        code
    }

    /// Normalize a city name for API consumption. A mapping hit wins and is
    /// returned verbatim; otherwise the trimmed original is transliterated.
    /// Blank or unusable input is returned unchanged.
    pub fn normalize_city_name(&self, city: &str) -> String {
        let trimmed = city.trim();
        if trimmed.is_empty() {
            return city.to_string();
        }
        let key = trimmed.to_lowercase();
        if let Some(mapped) = self.cities.get(&key) {
            return mapped.to_string();
        }
        transliterate(trimmed)
    }
}

use crate::config::ProviderProfile;
use crate::engine::keys::{first_present, resolve_key};
use crate::engine::status::normalize_status;
use crate::models::{NormalizedRecord, Origin, RawRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Maps raw rows of one provider profile into canonical records.
///
/// Never fails: missing or unparseable fields fall back to `None` or zero.
#[derive(Debug, Clone)]
pub struct Normalizer {
    profile: ProviderProfile,
    origin: Origin,
}

impl Normalizer {
    /// Normalizer tagging records with the profile's own side.
    pub fn new(profile: ProviderProfile) -> Self {
        let origin = profile.side;
        Self { profile, origin }
    }

    /// Normalizer tagging records with an explicit side, for profiles used on
    /// the opposite side of a reconciliation.
    pub fn with_origin(profile: ProviderProfile, origin: Origin) -> Self {
        Self { profile, origin }
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn normalize(&self, row: &RawRow) -> NormalizedRecord {
        let profile = &self.profile;
        let raw_status = first_present(row, &profile.status).unwrap_or_default();

        NormalizedRecord {
            id: resolve_key(row, &profile.id, &profile.id_keywords).map(str::to_string),
            raw_status: raw_status.to_string(),
            normalized_status: normalize_status(raw_status),
            amount: first_present(row, &profile.amount)
                .map(parse_amount)
                .unwrap_or(Decimal::ZERO),
            timestamp: first_present(row, &profile.timestamp).and_then(parse_timestamp),
            payment_method: first_present(row, &profile.payment_method).map(str::to_string),
            company: first_present(row, &profile.company).map(str::to_string),
            provider: profile.name.clone(),
            currency: first_present(row, &profile.currency).map(str::to_string),
            origin: self.origin,
        }
    }
}

/// Parse a money amount; anything unparseable is zero.
///
/// Accepts a leading or trailing currency marker, space or apostrophe
/// thousands separators, and either `.` or `,` as the decimal separator.
pub fn parse_amount(raw: &str) -> Decimal {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || c.is_alphabetic() || matches!(c, '€' | '$' | '£' | '¥' | '₽' | '₴')
    });
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    if compact.is_empty() {
        return Decimal::ZERO;
    }

    let canonical = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches(',').count() == 1 => compact.replace(',', "."),
        (None, Some(_)) => compact.replace(',', ""),
        _ => compact,
    };

    Decimal::from_str(&canonical)
        .or_else(|_| Decimal::from_scientific(&canonical))
        .unwrap_or(Decimal::ZERO)
}

/// Parse a timestamp in any of the accepted layouts.
///
/// Values carrying an offset keep their own wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(raw, f).ok())
    {
        return Some(dt.naive_local());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
    {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

//! Ranks catalog brokers by how likely they are to hold data for an email.
//!
//! The ranking is a pure function of `(email, catalog)`: a reproducible hash
//! seeds a base score, and fixed category and domain-class adjustments are
//! layered on top. Identical inputs always produce the identical ranking.

use serde::Serialize;

use crate::db::models::{Broker, BrokerCategory};

/// Most brokers returned for a single email.
pub const MAX_MATCHES: usize = 15;

/// Scores strictly above this are flagged as likely holding user data.
pub const USER_DATA_THRESHOLD: i32 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub broker: Broker,
    pub score: u8,
    pub has_user_data: bool,
}

const FREE_WEBMAIL: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "protonmail.com",
    "proton.me",
    "mail.com",
];

/// Webmail providers that run many country domains (yahoo.co.uk, gmx.de, ...).
const FREE_WEBMAIL_PREFIXES: &[&str] = &["yahoo.", "ymail.", "hotmail.", "gmx.", "yandex."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainClass {
    Unknown,
    Webmail,
    Education,
    Government,
    Business,
    Commercial,
}

fn classify_domain(domain: &str) -> DomainClass {
    if domain.is_empty() {
        DomainClass::Unknown
    } else if FREE_WEBMAIL.contains(&domain)
        || FREE_WEBMAIL_PREFIXES.iter().any(|p| domain.starts_with(p))
    {
        DomainClass::Webmail
    } else if domain.ends_with(".edu") {
        DomainClass::Education
    } else if domain.ends_with(".gov") {
        DomainClass::Government
    } else if !domain.ends_with(".com") {
        DomainClass::Business
    } else {
        DomainClass::Commercial
    }
}

/// Polynomial string hash over UTF-16 code units:
/// `h = h * 31 + unit`, wrapping in signed 32-bit arithmetic.
///
/// Scores persist across runs and exports, so this must stay bit-for-bit
/// stable.
pub fn string_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Base score in `[0, 50]` for an email/broker pair.
fn base_score(email: &str, broker_name: &str) -> i32 {
    let hash = string_hash(&format!("{email}{broker_name}"));
    (i64::from(hash).abs() % 51) as i32
}

fn category_weight(category: BrokerCategory) -> i32 {
    match category {
        BrokerCategory::PersonalData => 25,
        BrokerCategory::PeopleSearch => 20,
        BrokerCategory::BackgroundCheck => 18,
        BrokerCategory::Marketing => 15,
        BrokerCategory::Advertising => 12,
        BrokerCategory::CreditReporting => 10,
        BrokerCategory::RiskManagement => 10,
        BrokerCategory::SocialMedia => 8,
        BrokerCategory::Insurance => 6,
        BrokerCategory::Financial => 5,
        BrokerCategory::Other => 5,
    }
}

fn domain_adjustment(class: DomainClass, category: BrokerCategory) -> i32 {
    use BrokerCategory::*;

    match (class, category) {
        (DomainClass::Webmail, PeopleSearch) => 15,
        (DomainClass::Webmail, Marketing | Advertising) => 10,
        (DomainClass::Education, Marketing) => -10,
        (DomainClass::Education, BackgroundCheck) => 10,
        (DomainClass::Government, PeopleSearch) => -25,
        (DomainClass::Government, _) => -15,
        (DomainClass::Business, Marketing | RiskManagement | BackgroundCheck) => 10,
        _ => 0,
    }
}

fn email_domain(email: &str) -> String {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn score_broker(email: &str, broker: &Broker) -> u8 {
    let class = classify_domain(&email_domain(email));
    let raw = base_score(email, &broker.name)
        + category_weight(broker.category)
        + domain_adjustment(class, broker.category);
    raw.clamp(0, 100) as u8
}

/// Score every broker in `catalog` for `email` and return the best
/// [`MAX_MATCHES`], highest first. Equal scores keep catalog order.
pub fn score_brokers(email: &str, catalog: &[Broker]) -> Vec<MatchScore> {
    let mut scored: Vec<MatchScore> = catalog
        .iter()
        .map(|broker| {
            let score = score_broker(email, broker);
            MatchScore {
                broker: broker.clone(),
                score,
                has_user_data: i32::from(score) > USER_DATA_THRESHOLD,
            }
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(MAX_MATCHES);
    scored
}

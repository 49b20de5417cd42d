//! Built-in catalog of well-known data brokers.

use crate::db::models::{BrokerCategory, Difficulty, NewBroker, OptOutMethod};
use crate::db::{Database, Repository};
use crate::error::AppResult;

pub struct SeedBroker {
    pub name: &'static str,
    pub opt_out_url: &'static str,
    pub category: BrokerCategory,
    pub method: OptOutMethod,
    pub difficulty: Difficulty,
    pub data_types: &'static [&'static str],
    pub response_time: &'static str,
    pub premium: bool,
}

impl SeedBroker {
    pub fn to_new_broker(&self) -> NewBroker {
        NewBroker {
            name: self.name.to_string(),
            opt_out_url: Some(self.opt_out_url.to_string()),
            category: self.category,
            opt_out_method: self.method,
            data_types: self.data_types.iter().map(|s| s.to_string()).collect(),
            difficulty: self.difficulty,
            response_time: Some(self.response_time.to_string()),
            regions: vec!["US".into()],
            laws: vec!["CCPA".into()],
            premium: self.premium,
        }
    }
}

const CONTACT: &[&str] = &["name", "address", "phone", "email"];
const PROFILE: &[&str] = &["name", "address", "phone", "email", "relatives", "age"];
const RECORDS: &[&str] = &["name", "address", "criminal-records", "court-records"];
const CREDIT: &[&str] = &["name", "address", "ssn", "credit-history"];
const BANKING: &[&str] = &["name", "bank-accounts", "transactions"];
const AUDIENCE: &[&str] = &["email", "interests", "purchase-history", "demographics"];
const ONLINE: &[&str] = &["email", "device-ids", "browsing-history"];
const SOCIAL: &[&str] = &["name", "email", "social-profiles", "photos"];

macro_rules! seed {
    ($name:literal, $url:literal, $cat:ident, $method:ident, $diff:ident, $types:expr, $rt:literal) => {
        seed!($name, $url, $cat, $method, $diff, $types, $rt, false)
    };
    ($name:literal, $url:literal, $cat:ident, $method:ident, $diff:ident, $types:expr, $rt:literal, $premium:literal) => {
        SeedBroker {
            name: $name,
            opt_out_url: $url,
            category: BrokerCategory::$cat,
            method: OptOutMethod::$method,
            difficulty: Difficulty::$diff,
            data_types: $types,
            response_time: $rt,
            premium: $premium,
        }
    };
}

pub const SEED: &[SeedBroker] = &[
    // People search
    seed!("Spokeo", "https://www.spokeo.com/optout", PeopleSearch, Form, Easy, PROFILE, "1-3 days"),
    seed!("Whitepages", "https://www.whitepages.com/suppression-requests", PeopleSearch, Form, Medium, PROFILE, "1-2 days"),
    seed!("BeenVerified", "https://www.beenverified.com/app/optout/search", PeopleSearch, Form, Medium, PROFILE, "1-7 days"),
    seed!("Intelius", "https://www.intelius.com/opt-out", PeopleSearch, Form, Hard, PROFILE, "7-14 days", true),
    seed!("PeopleFinders", "https://www.peoplefinders.com/opt-out", PeopleSearch, Form, Medium, PROFILE, "1-3 days"),
    seed!("MyLife", "https://www.mylife.com/ccpa/index.pub", PeopleSearch, Form, Hard, PROFILE, "7-10 days"),
    seed!("Radaris", "https://radaris.com/control/privacy", PeopleSearch, Form, Hard, PROFILE, "2-7 days"),
    seed!("TruePeopleSearch", "https://www.truepeoplesearch.com/removal", PeopleSearch, Form, Easy, CONTACT, "1-3 days"),
    seed!("FastPeopleSearch", "https://www.fastpeoplesearch.com/removal", PeopleSearch, Form, Easy, CONTACT, "1-3 days"),
    seed!("PeopleLooker", "https://www.peoplelooker.com/f/optout/search", PeopleSearch, Form, Medium, PROFILE, "1-7 days"),
    seed!("USPhoneBook", "https://www.usphonebook.com/opt-out", PeopleSearch, Form, Easy, CONTACT, "1-2 days"),
    seed!("ThatsThem", "https://thatsthem.com/optout", PeopleSearch, Form, Easy, CONTACT, "1-7 days"),
    seed!("Nuwber", "https://nuwber.com/removal/link", PeopleSearch, Form, Medium, PROFILE, "1-2 days"),
    seed!("Addresses.com", "https://www.addresses.com/optout", PeopleSearch, Form, Easy, CONTACT, "2-5 days"),
    // Background checks
    seed!("TruthFinder", "https://www.truthfinder.com/opt-out", BackgroundCheck, Form, Medium, RECORDS, "1-2 days"),
    seed!("Instant Checkmate", "https://www.instantcheckmate.com/opt-out", BackgroundCheck, Form, Medium, RECORDS, "1-2 days"),
    seed!("CheckPeople", "https://www.checkpeople.com/opt-out", BackgroundCheck, Form, Medium, RECORDS, "2-7 days"),
    seed!("US Search", "https://www.ussearch.com/opt-out/submit", BackgroundCheck, Form, Hard, RECORDS, "7-14 days"),
    seed!("PublicRecordsNow", "https://www.publicrecordsnow.com/static/view/contact", BackgroundCheck, Email, Hard, RECORDS, "14-30 days"),
    // Credit reporting
    seed!("Equifax", "https://www.equifax.com/personal/privacy", CreditReporting, Manual, Hard, CREDIT, "30-45 days"),
    seed!("Experian", "https://www.experian.com/privacy/opting_out", CreditReporting, Manual, Hard, CREDIT, "30-45 days"),
    seed!("TransUnion", "https://www.transunion.com/consumer-privacy", CreditReporting, Form, Hard, CREDIT, "30-45 days"),
    // Financial
    seed!("ChexSystems", "https://www.chexsystems.com/security-freeze/place-freeze", Financial, Form, Hard, BANKING, "30 days"),
    seed!("Early Warning Services", "https://www.earlywarning.com/consumer-information", Financial, Email, Hard, BANKING, "30-45 days"),
    seed!("Plaid", "https://plaid.com/legal/data-protection-request-form", Financial, Form, Medium, BANKING, "30 days"),
    // Marketing
    seed!("Acxiom", "https://isapps.acxiom.com/optout/optout.aspx", Marketing, Form, Medium, AUDIENCE, "14-30 days"),
    seed!("Epsilon", "https://www.epsilon.com/us/consumer-preference-center", Marketing, Email, Medium, AUDIENCE, "14-30 days"),
    seed!("Oracle Advertising", "https://www.oracle.com/legal/privacy/marketing-cloud-data-cloud-privacy-policy.html", Marketing, Form, Medium, AUDIENCE, "30 days"),
    seed!("Alliant", "https://alliantinsight.com/privacy-policy", Marketing, Email, Medium, AUDIENCE, "14-30 days"),
    seed!("Data Axle", "https://www.data-axle.com/our-privacy-commitment", Marketing, Form, Medium, AUDIENCE, "14-30 days"),
    // Advertising
    seed!("LiveRamp", "https://liveramp.com/opt_out", Advertising, Form, Easy, ONLINE, "7 days"),
    seed!("Lotame", "https://www.lotame.com/about-lotame/privacy/opt-out", Advertising, Api, Easy, ONLINE, "7 days"),
    seed!("Quantcast", "https://www.quantcast.com/opt-out", Advertising, Form, Easy, ONLINE, "7 days"),
    // Risk management
    seed!("LexisNexis", "https://consumer.risk.lexisnexis.com/request", RiskManagement, Form, Hard, RECORDS, "30-45 days", true),
    // Insurance
    seed!("Verisk", "https://www.verisk.com/privacy/consumer-request", Insurance, Email, Hard, CREDIT, "30-45 days"),
    seed!("Milliman IntelliScript", "https://www.milliman.com/en/privacy-request", Insurance, Email, Hard, CREDIT, "30-45 days"),
    // Social media aggregators
    seed!("Social Catfish", "https://socialcatfish.com/opt-out", SocialMedia, Form, Easy, SOCIAL, "1-3 days"),
    seed!("Pipl", "https://pipl.com/personal-information-removal-request", SocialMedia, Form, Medium, SOCIAL, "7-14 days"),
    // Personal data aggregators
    seed!("CoreLogic", "https://www.corelogic.com/privacy-center", PersonalData, Form, Hard, CONTACT, "30-45 days"),
    // Other
    seed!("Archives.com", "https://www.archives.com/optout", Other, Manual, Medium, CONTACT, "14 days"),
];

/// Add every seed broker not already present (by name). Returns how many were added.
pub fn seed(db: &Database) -> AppResult<usize> {
    let mut added = 0;
    for entry in SEED {
        if db.get_broker_by_name(entry.name)?.is_some() {
            continue;
        }
        db.add_broker(entry.to_new_broker())?;
        added += 1;
    }
    tracing::info!("Seeded {added} broker(s) from the built-in catalog");
    Ok(added)
}

/// Seed a database that has never been seeded. A catalog the user has since
/// emptied is left alone.
pub fn seed_if_new(db: &Database) -> AppResult<usize> {
    if db.get_registry_meta("seeded_at")?.is_some() || !db.get_brokers()?.is_empty() {
        return Ok(0);
    }
    let added = seed(db)?;
    db.set_registry_meta("seeded_at", &chrono::Utc::now().to_rfc3339())?;
    Ok(added)
}

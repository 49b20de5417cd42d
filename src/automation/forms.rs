//! Simulated form introspection.
//!
//! Known broker domains map to hand-curated field schemas; anything else gets
//! a generic opt-out form. Lookups are pure, so a domain always yields the
//! same fields.

use serde::Serialize;

use super::guard::host_matches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Textarea,
    Checkbox,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub selector: String,
    pub kind: FieldKind,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

struct FieldSpec {
    selector: &'static str,
    kind: FieldKind,
    label: &'static str,
    required: bool,
    options: &'static [&'static str],
}

const fn field(
    selector: &'static str,
    kind: FieldKind,
    label: &'static str,
    required: bool,
) -> FieldSpec {
    FieldSpec {
        selector,
        kind,
        label,
        required,
        options: &[],
    }
}

impl FieldSpec {
    fn to_field(&self) -> FormField {
        FormField {
            selector: self.selector.to_string(),
            kind: self.kind,
            label: self.label.to_string(),
            required: self.required,
            options: (!self.options.is_empty())
                .then(|| self.options.iter().map(|o| o.to_string()).collect()),
        }
    }
}

const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC",
];

const GENERIC_FORM: &[FieldSpec] = &[
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='full_name']", FieldKind::Text, "Full name", true),
    field("input[name='phone']", FieldKind::Tel, "Phone number", false),
    field("textarea[name='additional_info']", FieldKind::Textarea, "Additional information", false),
    field("input[name='consent']", FieldKind::Checkbox, "I confirm this request concerns my own data", true),
];

const SPOKEO: &[FieldSpec] = &[
    field("input[name='url']", FieldKind::Text, "Listing URL", true),
    field("input[name='email']", FieldKind::Email, "Email address", true),
];

const WHITEPAGES: &[FieldSpec] = &[
    field("input[name='url']", FieldKind::Text, "Profile URL", true),
    field("input[name='phone']", FieldKind::Tel, "Verification phone", true),
    FieldSpec {
        selector: "select[name='reason']",
        kind: FieldKind::Select,
        label: "Reason for removal",
        required: true,
        options: &["privacy", "incorrect information", "safety concern", "other"],
    },
];

const BEENVERIFIED: &[FieldSpec] = &[
    field("input[name='first_name']", FieldKind::Text, "First name", true),
    field("input[name='last_name']", FieldKind::Text, "Last name", true),
    FieldSpec {
        selector: "select[name='state']",
        kind: FieldKind::Select,
        label: "State",
        required: true,
        options: US_STATES,
    },
    field("input[name='email']", FieldKind::Email, "Email address", true),
];

const INTELIUS: &[FieldSpec] = &[
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='first_name']", FieldKind::Text, "First name", true),
    field("input[name='last_name']", FieldKind::Text, "Last name", true),
    field("input[name='dob']", FieldKind::Text, "Date of birth", false),
    field("input[name='terms']", FieldKind::Checkbox, "I agree to the terms", true),
];

const ACXIOM: &[FieldSpec] = &[
    FieldSpec {
        selector: "select[name='request_type']",
        kind: FieldKind::Select,
        label: "Request type",
        required: true,
        options: &["opt-out", "access", "delete"],
    },
    field("input[name='full_name']", FieldKind::Text, "Full name", true),
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='street']", FieldKind::Text, "Street address", false),
    field("input[name='zip']", FieldKind::Text, "ZIP code", false),
];

const MYLIFE: &[FieldSpec] = &[
    field("input[name='full_name']", FieldKind::Text, "Full name", true),
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='profile_url']", FieldKind::Text, "Profile URL", false),
    field("textarea[name='message']", FieldKind::Textarea, "Message", false),
];

const RADARIS: &[FieldSpec] = &[
    field("input[name='profile_url']", FieldKind::Text, "Profile URL", true),
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='confirm']", FieldKind::Checkbox, "This is my profile", true),
];

const PEOPLEFINDERS: &[FieldSpec] = &[
    field("input[name='email']", FieldKind::Email, "Email address", true),
    field("input[name='record_url']", FieldKind::Text, "Record URL", true),
];

const KNOWN_FORMS: &[(&str, &[FieldSpec])] = &[
    ("spokeo.com", SPOKEO),
    ("whitepages.com", WHITEPAGES),
    ("beenverified.com", BEENVERIFIED),
    ("intelius.com", INTELIUS),
    ("acxiom.com", ACXIOM),
    ("mylife.com", MYLIFE),
    ("radaris.com", RADARIS),
    ("peoplefinders.com", PEOPLEFINDERS),
];

/// Field schema for `host`, falling back to the generic opt-out form.
pub fn fields_for_host(host: &str) -> Vec<FormField> {
    let host = host.to_ascii_lowercase();
    let specs = KNOWN_FORMS
        .iter()
        .find(|(domain, _)| host_matches(&host, domain))
        .map(|(_, specs)| *specs)
        .unwrap_or(GENERIC_FORM);
    specs.iter().map(FieldSpec::to_field).collect()
}

/// The `name` attribute a selector targets, used as the payload key.
pub fn field_name(selector: &str) -> Option<&str> {
    let start = selector.find("name='")? + "name='".len();
    let rest = &selector[start..];
    rest.find('\'').map(|end| &rest[..end])
}

use once_cell::sync::Lazy;
use regex::Regex;

use super::ContactProperties;
use crate::store::Submission;

static PRIVATE_APP_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^pat-[a-z0-9]+-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid token regex")
});

static LEGACY_API_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid api key regex")
});

/// Private-app tokens (`pat-na1-<uuid>`) and legacy hapikeys are accepted.
pub fn is_hubspot_token(token: &str) -> bool {
    let token = token.trim().to_ascii_lowercase();
    PRIVATE_APP_TOKEN.is_match(&token) || LEGACY_API_KEY.is_match(&token)
}

/// First word is the first name, the rest is the last name.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

fn amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

pub fn hubspot_properties(submission: &Submission) -> ContactProperties {
    let (first_name, last_name) = split_name(&submission.name);
    let mut props = ContactProperties::new();

    props.insert("email".into(), submission.email.trim().to_string());
    props.insert("firstname".into(), first_name);
    props.insert("lastname".into(), last_name);
    props.insert(
        "missed_payments".into(),
        submission.missed_payments.unwrap_or(0).to_string(),
    );
    props.insert(
        "received_nod".into(),
        if submission.received_nod.unwrap_or(false) { "Yes" } else { "No" }.into(),
    );
    props.insert("property_value".into(), amount(submission.property_value));
    props.insert("mortgage_balance".into(), amount(submission.mortgage_balance));

    let optional = [
        ("phone", &submission.phone),
        ("address", &submission.property_address),
        ("foreclosure_status", &submission.status),
        ("urgency_level", &submission.urgency_level),
        ("challenges", &submission.challenges),
        ("difficulties", &submission.difficulties),
        ("family_impact", &submission.family_impact),
        ("financial_impact", &submission.financial_impact),
        ("preferred_solution", &submission.preferred_solution),
        ("openness_to_options", &submission.openness_to_options),
    ];
    for (key, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            props.insert(key.into(), value.to_string());
        }
    }

    props
}

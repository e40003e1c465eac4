//! In-toto predicate type names.
//!
//! Policies may name attestation types either by the full predicate URI or
//! by the short names cosign accepts on `--type`.

use std::collections::BTreeSet;

const KNOWN: &[(&str, &str)] = &[
    ("https://slsa.dev/provenance/v0.2", "slsaprovenance"),
    ("https://slsa.dev/provenance/v1", "slsaprovenance1"),
    ("https://spdx.dev/Document", "spdxjson"),
    ("https://cyclonedx.org/bom", "cyclonedx"),
    ("https://cosign.sigstore.dev/attestation/vuln/v1", "vuln"),
    ("https://cosign.sigstore.dev/attestation/v1", "custom"),
    ("https://in-toto.io/attestation/link/v0.3", "link"),
    ("https://openvex.dev/ns", "openvex"),
];

/// Short name for a predicate URI, if it is a well-known one.
pub fn short_name(predicate_type: &str) -> Option<&'static str> {
    let trimmed = predicate_type.trim_end_matches('/');
    KNOWN
        .iter()
        .find(|(uri, _)| *uri == trimmed)
        .map(|(_, short)| *short)
}

/// Name reported in attestation details: the short name when known.
pub fn display_name(predicate_type: &str) -> String {
    short_name(predicate_type)
        .map(str::to_string)
        .unwrap_or_else(|| predicate_type.to_string())
}

/// Whether `predicate_type` satisfies `required`. An empty set accepts anything.
pub fn is_required(required: &BTreeSet<String>, predicate_type: &str) -> bool {
    if required.is_empty() {
        return true;
    }
    if required.contains(predicate_type) {
        return true;
    }
    match short_name(predicate_type) {
        Some(short) => {
            required.contains(short) || (short == "slsaprovenance" && required.contains("slsaprovenance02"))
        }
        None => false,
    }
}

//! Record clean-up rules for scraped listings

/// Whether a listing row names a clinic. Rows without the marker are
/// hospitals or departments and are not scored.
pub fn is_clinic_name(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.contains(marker)
}

/// Reduce a listed clinic address to one geocodable street address.
///
/// - keep the first of several addresses joined by `、`
/// - drop a parenthesised floor/annex suffix
/// - end with a house number marker `號` when the source omitted it
pub fn normalize_clinic_address(raw: &str) -> String {
    let first = raw.split('、').next().unwrap_or_default();
    let street = first.split('(').next().unwrap_or_default().trim();
    if street.contains('號') {
        street.to_string()
    } else {
        format!("{}號", street)
    }
}

/// School addresses carry a `[postcode]` prefix; keep what follows the last `]`.
pub fn normalize_school_address(raw: &str) -> String {
    raw.rsplit(']').next().unwrap_or_default().trim().to_string()
}

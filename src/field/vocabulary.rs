pub const CREDIT_CARD_TYPES: [&str; 10] = [
    "cc-name",
    "cc-given-name",
    "cc-additional-name",
    "cc-family-name",
    "cc-number",
    "cc-exp-month",
    "cc-exp-year",
    "cc-exp",
    "cc-type",
    "cc-csc",
];

pub const ADDRESS_TYPES: [&str; 26] = [
    "name",
    "given-name",
    "additional-name",
    "family-name",
    "organization",
    "email",
    "street-address",
    "address-line1",
    "address-line2",
    "address-line3",
    "address-level1",
    "address-level2",
    "address-level3",
    "address-streetname",
    "address-housenumber",
    "postal-code",
    "country",
    "country-name",
    "tel",
    "tel-country-code",
    "tel-national",
    "tel-area-code",
    "tel-local",
    "tel-local-prefix",
    "tel-local-suffix",
    "tel-extension",
];

/// Every field name an editor may pick: address types, then credit card types.
pub fn known_field_names() -> impl Iterator<Item = &'static str> {
    ADDRESS_TYPES.iter().chain(CREDIT_CARD_TYPES.iter()).copied()
}

pub fn is_known_field_name(name: &str) -> bool {
    known_field_names().any(|n| n == name)
}

/// Options offered when editing a field name. The current value always comes
/// first so that opening the editor never changes the selection.
pub fn edit_options(current: &str) -> Vec<String> {
    let mut options = Vec::with_capacity(ADDRESS_TYPES.len() + CREDIT_CARD_TYPES.len() + 1);
    options.push(current.to_string());
    options.extend(
        known_field_names()
            .filter(|name| *name != current)
            .map(str::to_string),
    );
    options
}

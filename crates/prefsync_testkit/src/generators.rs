//! Property-based test generators.

use chrono::TimeDelta;
use prefsync_core::IdShape;
use proptest::prelude::*;

/// Generates identifiers of the given shape in any digit/letter order.
pub fn valid_id_strategy(shape: IdShape) -> impl Strategy<Value = String> {
    let digits = prop::collection::vec(prop::char::range('0', '9'), shape.digits);
    let letters = prop::collection::vec(prop::char::range('a', 'z'), shape.letters);
    (digits, letters)
        .prop_flat_map(|(digits, letters)| {
            let chars: Vec<char> = digits.into_iter().chain(letters).collect();
            Just(chars).prop_shuffle()
        })
        .prop_map(|chars| chars.into_iter().collect())
}

/// Generates strings that are never valid identifiers of the given shape.
pub fn malformed_id_strategy(shape: IdShape) -> impl Strategy<Value = String> {
    prop_oneof![
        // one digit too many
        valid_id_strategy(IdShape {
            digits: shape.digits + 1,
            letters: shape.letters,
        }),
        // one letter too few
        valid_id_strategy(IdShape {
            digits: shape.digits,
            letters: shape.letters.saturating_sub(1),
        })
        .prop_filter("shape must change", move |_| shape.letters > 0),
        // a character outside the alphabet
        (valid_id_strategy(shape), prop::sample::select(vec!['A', 'Z', '-', '_', ' ', 'ß', '!']))
            .prop_map(|(id, bad)| {
                let mut id: Vec<char> = id.chars().collect();
                if let Some(first) = id.first_mut() {
                    *first = bad;
                } else {
                    id.push(bad);
                }
                id.into_iter().collect()
            }),
    ]
}

/// Generates opaque preference payloads.
pub fn payload_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,64}").expect("valid payload regex")
}

/// Generates signed offsets within a day, at one-second resolution.
pub fn offset_strategy() -> impl Strategy<Value = TimeDelta> {
    (-86_400i64..=86_400).prop_map(TimeDelta::seconds)
}

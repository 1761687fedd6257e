use uuid::Uuid;

pub const TOKEN_PREFIX: &str = "REF-";
const TOKEN_DIGITS: usize = 16;
const SUFFIX_LEN: usize = 9;
const REF_PARAM: &str = "ref";

/// Generates a referral token for `user_id` from the current time and a
/// random suffix. Two calls for the same user will almost always differ, but
/// nothing here checks for collisions.
pub fn generate(user_id: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();

    token_from_parts(user_id, timestamp, &suffix[..SUFFIX_LEN])
}

/// Folds `user_id`, `timestamp` and `suffix` into a token.
///
/// Uses a 31-multiplier rolling hash over UTF-16 code units in a wrapping
/// `i32`, then renders the absolute value as 16 zero-padded hex digits.
pub fn token_from_parts(user_id: &str, timestamp: i64, suffix: &str) -> String {
    let seed = format!("{}{}{}", user_id, timestamp, suffix);
    let hash = seed
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32));

    // i32::MIN has no positive i32 counterpart.
    format!("{}{:016X}", TOKEN_PREFIX, hash.unsigned_abs())
}

/// Checks that `token` is `REF-` followed by exactly 16 uppercase hex digits.
/// Says nothing about whether any ledger knows it.
pub fn is_valid_format(token: &str) -> bool {
    match token.strip_prefix(TOKEN_PREFIX) {
        Some(digits) => {
            digits.len() == TOKEN_DIGITS
                && digits
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
        }
        None => false,
    }
}

/// Appends `?ref=<token>` (or `&ref=` when a query is already present) to a
/// signup URL.
pub fn referral_link(signup_url: &str, token: &str) -> String {
    let separator = if signup_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", signup_url, separator, REF_PARAM, token)
}

/// Pulls the `ref` query parameter back out of a signup link.
pub fn token_from_link(link: &str) -> Option<&str> {
    let (_, query) = link.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == REF_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn folds_like_a_32_bit_string_hash() {
        // "a0" -> 97*31 + 48 = 3055
        assert_eq!(token_from_parts("a", 0, ""), "REF-0000000000000BEF");
        assert_eq!(
            token_from_parts("ab", 0, ""),
            format!("REF-{:016X}", (97 * 31 + 98) * 31 + 48)
        );
    }

    #[test]
    fn wraps_on_overflow_and_takes_absolute_value() {
        let long_id = "z".repeat(64);
        let token = token_from_parts(&long_id, 1_700_000_000_000, "abc123xyz");
        assert!(is_valid_format(&token));
        assert!(token[4..12].chars().all(|c| c == '0'));
    }

    #[test]
    fn absolute_value_of_minimum_hash_does_not_overflow() {
        // "u17972000\u{8b17}" folds to exactly i32::MIN.
        assert_eq!(
            token_from_parts("u", 17972000, "\u{8b17}"),
            "REF-0000000080000000"
        );
    }

    #[test]
    fn folds_surrogate_pairs_as_two_code_units() {
        let emoji = token_from_parts("\u{1F600}", 0, "");
        let hash = [0xD83Di32, 0xDE00, 48]
            .iter()
            .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(*unit));
        assert_eq!(emoji, format!("REF-{:016X}", hash.unsigned_abs()));
    }

    #[test]
    fn links_carry_the_token() {
        let token = "REF-00000000DEADBEEF";

        let link = referral_link("https://example.com/signup", token);
        assert_eq!(link, "https://example.com/signup?ref=REF-00000000DEADBEEF");
        assert_eq!(token_from_link(&link), Some(token));

        let link = referral_link("https://example.com/signup?utm=mail", token);
        assert_eq!(
            link,
            "https://example.com/signup?utm=mail&ref=REF-00000000DEADBEEF"
        );
        assert_eq!(token_from_link(&link), Some(token));
    }

    #[test]
    fn links_without_a_ref_yield_nothing() {
        assert_eq!(token_from_link("https://example.com/signup"), None);
        assert_eq!(token_from_link("https://example.com/signup?utm=mail"), None);
        assert_eq!(token_from_link("https://example.com/signup?ref="), None);
        assert_eq!(
            token_from_link("https://example.com/signup?ref=REF-0000000000000001#top"),
            Some("REF-0000000000000001")
        );
    }

    #[test]
    fn same_inputs_give_same_token() {
        assert_eq!(
            token_from_parts("alice", 42, "k3j4h5g6f"),
            token_from_parts("alice", 42, "k3j4h5g6f")
        );
        assert_ne!(
            token_from_parts("alice", 42, "k3j4h5g6f"),
            token_from_parts("alice", 43, "k3j4h5g6f")
        );
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(is_valid_format("REF-0000000000000000"));
        assert!(is_valid_format("REF-0123456789ABCDEF"));
        assert!(!is_valid_format("REF-0123456789abcdef"));
        assert!(!is_valid_format("REF-0123456789ABCDE"));
        assert!(!is_valid_format("REF-0123456789ABCDEF0"));
        assert!(!is_valid_format("ref-0123456789ABCDEF"));
        assert!(!is_valid_format("REF-0123456789ABCDEG"));
        assert!(!is_valid_format("0123456789ABCDEF"));
        assert!(!is_valid_format(""));
    }

    proptest! {
        #[test]
        fn generated_tokens_are_well_formed(user_id in "\\PC{1,64}") {
            prop_assert!(is_valid_format(&generate(&user_id)));
        }

        #[test]
        fn folded_tokens_are_well_formed(
            user_id in "\\PC{1,64}",
            timestamp in any::<i64>(),
            suffix in "[a-z0-9]{0,12}",
        ) {
            prop_assert!(is_valid_format(&token_from_parts(&user_id, timestamp, &suffix)));
        }
    }
}

//! String lists stored as character codes.
//!
//! A list is the concatenation of each string's Unicode scalar values with
//! code 44 (`,`) between entries. Strings therefore must not contain commas.

use crate::error::{StoreError, StoreResult};

pub const DELIMITER: i64 = 44;

/// Encode `strings` as char codes joined by [`DELIMITER`].
pub fn encode_strings<S: AsRef<str>>(strings: &[S]) -> Vec<i64> {
    let mut codes = Vec::new();
    for (i, s) in strings.iter().enumerate() {
        if i > 0 {
            codes.push(DELIMITER);
        }
        codes.extend(s.as_ref().chars().map(|c| i64::from(u32::from(c))));
    }
    codes
}

/// Decode a char-code list. An empty slice decodes to an empty list.
pub fn decode_strings(codes: &[i64]) -> StoreResult<Vec<String>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    codes
        .split(|&c| c == DELIMITER)
        .map(|part| {
            part.iter()
                .map(|&code| {
                    u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| StoreError::corrupt(format!("invalid char code {code}")))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_comma_delimiter() {
        let codes = encode_strings(&["ab", "c"]);
        assert_eq!(codes, vec![97, 98, 44, 99]);
    }

    #[test]
    fn decodes_component_keys() {
        let keys = ["combustor:mass", "exhaust_1:CO2"];
        let decoded = decode_strings(&encode_strings(&keys)).unwrap();
        assert_eq!(decoded, keys);
    }

    #[test]
    fn empty_list_is_empty() {
        assert!(encode_strings::<&str>(&[]).is_empty());
        assert!(decode_strings(&[]).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_code_points() {
        assert!(matches!(
            decode_strings(&[97, -3]),
            Err(StoreError::Corrupt { .. })
        ));
        assert!(decode_strings(&[0xD800]).is_err());
    }

    #[test]
    fn non_ascii_names_survive() {
        let decoded = decode_strings(&encode_strings(&["Ø2:température"])).unwrap();
        assert_eq!(decoded, vec!["Ø2:température"]);
    }
}

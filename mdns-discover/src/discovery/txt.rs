use std::collections::BTreeMap;
use shared::protocol::TXT_SEPARATOR;

/// TXT record as shown to the user and as structured attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTxt {
    /// Every segment joined with ';', bare keys included
    pub joined: String,
    /// `key=value` segments; `None` when no segment parsed as a pair
    pub attributes: Option<BTreeMap<String, String>>,
}

/// Splits each segment on its first '='. Segments without '=' or with an
/// empty key stay in the joined text only. A repeated key keeps its first value.
pub fn parse_txt(segments: &[String]) -> ParsedTxt {
    if segments.is_empty() {
        return ParsedTxt::default();
    }

    let mut attributes = BTreeMap::new();
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        attributes
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    ParsedTxt {
        joined: segments.join(TXT_SEPARATOR),
        attributes: (!attributes.is_empty()).then_some(attributes),
    }
}

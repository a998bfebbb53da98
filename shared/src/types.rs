use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

/// A discovered service instance, one record per resolved address.
/// This is the canonical data model emitted as JSON and consumed by anything reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Queried service type, e.g. "_http._tcp"
    #[serde(rename = "service", default, skip_serializing_if = "String::is_empty")]
    pub service_type: String,

    /// Host name reported by the advertiser, e.g. "nas.local."
    pub hostname: String,

    /// A single IPv4 or IPv6 literal
    pub address: String,

    /// Advertised port
    pub port: u16,

    /// TXT segments joined with ';' in advertisement order
    pub text: String,

    /// key=value TXT segments, present only when at least one segment parsed
    #[serde(rename = "txtMap", default, skip_serializing_if = "Option::is_none")]
    pub txt_attributes: Option<BTreeMap<String, String>>,
}

/// Output format of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One line per instance, streamed as results arrive
    #[default]
    Text,
    /// A single JSON document written once the run is complete
    Json,
}

/// A column of the text output.
///
/// Declaration order is the rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputField {
    Count,
    Service,
    Hostname,
    Address,
    Port,
    Text,
}

impl OutputField {
    pub const ALL: [OutputField; 6] = [
        OutputField::Count,
        OutputField::Service,
        OutputField::Hostname,
        OutputField::Address,
        OutputField::Port,
        OutputField::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputField::Count => "count",
            OutputField::Service => "service",
            OutputField::Hostname => "hostname",
            OutputField::Address => "address",
            OutputField::Port => "port",
            OutputField::Text => "text",
        }
    }

    /// Looks up a field by its name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized set of output fields.
///
/// Keeps the order in which fields were first requested for display purposes;
/// rendering itself always follows [`OutputField::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    fields: Vec<OutputField>,
}

impl FieldSelection {
    /// Normalizes requested field names.
    ///
    /// Blank names are dropped; if none remain every field is selected.
    /// Otherwise unknown names are ignored and repeats collapse onto their
    /// first occurrence.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<S> = names
            .into_iter()
            .filter(|name| !name.as_ref().trim().is_empty())
            .collect();
        // A list of nothing but blanks, such as " , " or an empty
        // MDNS_FIELD_FILTER, counts as no list at all and keeps every field
        if requested.is_empty() {
            return Self::default();
        }

        let mut fields = Vec::new();
        for name in &requested {
            let Some(field) = OutputField::from_name(name.as_ref().trim()) else {
                continue;
            };
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Self { fields }
    }

    /// Splits a comma separated list such as "hostname, port".
    pub fn parse_list(list: &str) -> Self {
        Self::from_names(list.split(','))
    }

    pub fn contains(&self, field: OutputField) -> bool {
        self.fields.contains(&field)
    }

    /// Fields in first-requested order
    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self {
            fields: OutputField::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_service() -> Service {
        Service {
            service_type: "_http._tcp".to_string(),
            hostname: "nas.local.".to_string(),
            address: "10.0.0.5".to_string(),
            port: 80,
            text: "path=/;junk".to_string(),
            txt_attributes: Some(BTreeMap::from([("path".to_string(), "/".to_string())])),
        }
    }

    #[test]
    fn test_no_names_selects_everything() {
        let selection = FieldSelection::from_names(Vec::<String>::new());
        assert_eq!(selection.fields(), &OutputField::ALL);
    }

    #[test]
    fn test_blank_list_selects_all_fields() {
        assert_eq!(FieldSelection::parse_list(" , ").fields(), &OutputField::ALL);
        assert_eq!(FieldSelection::parse_list("").fields(), &OutputField::ALL);
    }

    #[test]
    fn test_selection_drops_blanks_unknowns_and_repeats() {
        let selection = FieldSelection::from_names(["port", " ", "bogus", "hostname", "port "]);
        assert_eq!(selection.fields(), &[OutputField::Port, OutputField::Hostname]);
        assert!(!selection.contains(OutputField::Text));
    }

    #[test]
    fn test_only_unknown_names_select_nothing() {
        let selection = FieldSelection::parse_list("colour,size");
        assert!(selection.is_empty());
    }

    #[test]
    fn test_parse_list_trims_names() {
        let selection = FieldSelection::parse_list("hostname, address ,port");
        assert_eq!(
            selection.fields(),
            &[OutputField::Hostname, OutputField::Address, OutputField::Port]
        );
    }

    #[test]
    fn test_json_omits_empty_service_and_missing_txt_map() {
        let service = Service {
            service_type: String::new(),
            txt_attributes: None,
            text: String::new(),
            ..sample_service()
        };
        let value = serde_json::to_value(&service).unwrap();
        let object = value.as_object().unwrap();

        assert!(!object.contains_key("service"));
        assert!(!object.contains_key("txtMap"));
        assert_eq!(object["text"], "");
        assert_eq!(object["port"], 80);
    }

    #[test]
    fn test_json_round_trip_preserves_every_field() {
        let with_txt = sample_service();
        let without_txt = Service {
            txt_attributes: None,
            ..sample_service()
        };
        let services = vec![with_txt, without_txt];

        let json = serde_json::to_string(&services).unwrap();
        let decoded: Vec<Service> = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, services);
        assert!(json.contains("\"txtMap\":{\"path\":\"/\"}"));
        assert_eq!(json.matches("txtMap").count(), 1);
    }
}

use crate::io_struct::ViewDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic aliases per OData service, handed to the model with the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldGuide(BTreeMap<String, BTreeMap<String, String>>);

impl FieldGuide {
    pub fn new(views: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self(views)
    }

    pub fn aliases(&self, view: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(view)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}

impl Default for FieldGuide {
    fn default() -> Self {
        let aliases: BTreeMap<String, String> = [
            ("CompanyField", "CompanyName"),
            ("CountryField", "Country"),
            ("CityField", "Address/City"),
            ("Currency", "CurrencyCode"),
        ]
        .into_iter()
        .map(|(alias, field)| (alias.to_string(), field.to_string()))
        .collect();
        Self(BTreeMap::from([("GWSAMPLE_BASIC".to_string(), aliases)]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedEntity {
    pub view: String,
    pub entity: String,
    pub fields: Vec<String>,
}

/// Entity sets and fields the model may reference.
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: Vec<AllowedEntity>,
}

impl AllowList {
    pub fn new(entries: Vec<AllowedEntity>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AllowedEntity] {
        &self.entries
    }

    /// Only the view and entity are checked; filters are opaque.
    pub fn permits(&self, descriptor: &ViewDescriptor) -> bool {
        self.entries
            .iter()
            .any(|e| e.view == descriptor.view && e.entity == descriptor.entity)
    }

    /// Prompt rendering, one block per entity set.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "- Service: {}\n  - Entity: {}\n  - Fields: {}",
                    e.view,
                    e.entity,
                    e.fields.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(vec![AllowedEntity {
            view: "GWSAMPLE_BASIC".to_string(),
            entity: "BusinessPartnerSet".to_string(),
            fields: [
                "CompanyName",
                "BusinessPartnerID",
                "CurrencyCode",
                "EmailAddress",
                "Country",
                "Address/City",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        }])
    }
}

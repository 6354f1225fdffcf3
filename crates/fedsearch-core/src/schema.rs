//! Per-index field capability model.
//!
//! A [`Schema`] maps index names to [`IndexDescriptor`]s built from the
//! engine's own settings payload (`GET /indexes/:uid/settings` on Meilisearch,
//! the index settings object on Algolia) plus optional type hints.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Identifier,
    Text,
    Int,
    Float,
    Bool,
    DateTime,
}

impl FieldType {
    /// Map a type hint to a field type. Unknown hints are text.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => FieldType::Int,
            "float" | "double" | "number" => FieldType::Float,
            "bool" | "boolean" => FieldType::Bool,
            "datetime" | "date" => FieldType::DateTime,
            _ => FieldType::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub searchable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub distinct: bool,
    pub facet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub identifier: String,
    /// Fields in first-seen order; the identifier is always present.
    pub fields: Vec<FieldDescriptor>,
}

impl IndexDescriptor {
    pub fn build(name: &str, settings: &IndexSettings, type_hints: &Fields) -> Self {
        let mut names: Vec<&str> = Vec::new();
        for n in settings
            .searchable
            .iter()
            .chain(&settings.filterable)
            .chain(&settings.sortable)
            .chain(&settings.facet)
            .map(String::as_str)
            .chain(std::iter::once(settings.identifier.as_str()))
        {
            if !names.contains(&n) {
                names.push(n);
            }
        }

        let fields = names
            .into_iter()
            .map(|field| {
                if field == settings.identifier {
                    return FieldDescriptor {
                        name: field.to_string(),
                        field_type: FieldType::Identifier,
                        searchable: false,
                        filterable: false,
                        sortable: false,
                        distinct: false,
                        facet: false,
                    };
                }
                let field_type = type_hints
                    .get(field)
                    .and_then(Value::as_str)
                    .map_or(FieldType::Text, FieldType::from_hint);
                let has = |list: &[String]| list.iter().any(|f| f == field);
                FieldDescriptor {
                    name: field.to_string(),
                    field_type,
                    searchable: field_type != FieldType::DateTime && has(settings.searchable.as_slice()),
                    filterable: has(settings.filterable.as_slice()),
                    sortable: has(settings.sortable.as_slice()),
                    distinct: settings.distinct.as_deref() == Some(field),
                    facet: has(settings.facet.as_slice()),
                }
            })
            .collect();

        Self { name: name.to_string(), identifier: settings.identifier.clone(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        name == self.identifier || self.field(name).is_some_and(|f| f.filterable)
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.sortable)
    }

    pub fn distinct_field(&self) -> Option<&str> {
        self.fields.iter().find(|f| f.distinct).map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    indexes: BTreeMap<String, IndexDescriptor>,
}

impl Schema {
    pub fn new(indexes: impl IntoIterator<Item = IndexDescriptor>) -> Self {
        Self { indexes: indexes.into_iter().map(|d| (d.name.clone(), d)).collect() }
    }

    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.get(name)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Capability lists read from one index's settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSettings {
    pub searchable: Vec<String>,
    pub filterable: Vec<String>,
    pub sortable: Vec<String>,
    pub facet: Vec<String>,
    pub distinct: Option<String>,
    pub identifier: String,
}

/// Which engine's settings vocabulary a settings file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    Meilisearch,
    Algolia,
}

impl BackendFamily {
    pub fn default_identifier(&self) -> &'static str {
        match self {
            BackendFamily::Meilisearch => "id",
            BackendFamily::Algolia => "objectID",
        }
    }

    pub fn settings(&self, raw: &Fields) -> IndexSettings {
        match self {
            // Meilisearch facets on filterable attributes.
            BackendFamily::Meilisearch => {
                let filterable = string_list(raw.get("filterableAttributes"));
                IndexSettings {
                    searchable: string_list(raw.get("searchableAttributes")),
                    facet: filterable.clone(),
                    filterable,
                    sortable: string_list(raw.get("sortableAttributes")),
                    distinct: raw.get("distinctAttribute").and_then(Value::as_str).map(str::to_string),
                    identifier: raw
                        .get("primaryKey")
                        .and_then(Value::as_str)
                        .unwrap_or(self.default_identifier())
                        .to_string(),
                }
            }
            // Sorting on Algolia goes through replicas, so nothing is sortable here.
            BackendFamily::Algolia => {
                let facets: Vec<String> = string_list(raw.get("attributesForFaceting"))
                    .iter()
                    .map(|a| unwrap_modifier(a).to_string())
                    .collect();
                let searchable = string_list(raw.get("searchableAttributes"))
                    .iter()
                    .flat_map(|entry| entry.split(','))
                    .map(|a| unwrap_modifier(a.trim()).to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                IndexSettings {
                    searchable,
                    filterable: facets.clone(),
                    sortable: Vec::new(),
                    facet: facets,
                    distinct: raw.get("attributeForDistinct").and_then(Value::as_str).map(str::to_string),
                    identifier: self.default_identifier().to_string(),
                }
            }
        }
    }
}

/// Build a schema from raw settings and type hints keyed by index name.
/// Indexes that only have type hints get no descriptor.
pub fn build_schema(
    family: BackendFamily,
    settings_by_index: &BTreeMap<String, Fields>,
    type_hints: &BTreeMap<String, Fields>,
) -> Schema {
    let empty = Fields::new();
    Schema::new(settings_by_index.iter().map(|(index, raw)| {
        let hints = type_hints.get(index).unwrap_or(&empty);
        IndexDescriptor::build(index, &family.settings(raw), hints)
    }))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// `searchable(brand)` → `brand`, `unordered(title)` → `title`.
fn unwrap_modifier(attr: &str) -> &str {
    match (attr.find('('), attr.strip_suffix(')')) {
        (Some(open), Some(inner)) => &inner[open + 1..],
        _ => attr,
    }
}

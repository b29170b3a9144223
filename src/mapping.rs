//! Field-mapping resolution: turns a profile's stored rules into the
//! [`MappingSpec`] the projector executes.

use log::warn;

use crate::{
    data::FieldType,
    profile::{FieldMappingRule, RULE_KIND_CONSTANT, RULE_KIND_INDEXED},
};

/// Target field that identifies a price row. Rows without it are never loaded.
pub const KEY_FIELD: &str = "DetailNum";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Zero-based source column.
    Column(usize),
    /// Literal broadcast to every row.
    Constant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub source: FieldSource,
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn describe(&self) -> String {
        match &self.source {
            FieldSource::Column(idx) => format!("{}=#{}:{}", self.name, idx + 1, self.field_type),
            FieldSource::Constant(value) => {
                format!("{}='{}':{}", self.name, value, self.field_type)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSpec {
    fields: Vec<FieldSpec>,
}

impl MappingSpec {
    /// Builds the spec in rule order. Unusable rules are logged and left out.
    /// A repeated target field keeps its first position and takes the last rule's
    /// source and type.
    pub fn resolve(rules: &[FieldMappingRule]) -> Self {
        let mut spec = MappingSpec::default();
        for rule in rules {
            if let Some(field) = resolve_rule(rule) {
                spec.insert(field);
            }
        }
        spec
    }

    pub fn from_fields(fields: Vec<FieldSpec>) -> Self {
        let mut spec = MappingSpec::default();
        for field in fields {
            spec.insert(field);
        }
        spec
    }

    fn insert(&mut self, field: FieldSpec) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            warn!(
                "Field '{}' is mapped more than once; using the last rule ({})",
                field.name,
                field.describe()
            );
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_key_field(&self) -> bool {
        self.field(KEY_FIELD).is_some()
    }

    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(FieldSpec::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn resolve_rule(rule: &FieldMappingRule) -> Option<FieldSpec> {
    let name = rule.target_field.trim();
    if name.is_empty() {
        warn!("Skipping mapping rule without a target field: {rule:?}");
        return None;
    }
    let field_type = rule
        .declared_type
        .as_deref()
        .map(FieldType::from_sql_type)
        .unwrap_or(FieldType::String);
    let source = match rule.kind {
        RULE_KIND_INDEXED => FieldSource::Column(resolve_index(name, rule.value.as_deref())?),
        RULE_KIND_CONSTANT => FieldSource::Constant(rule.value.clone().unwrap_or_default()),
        other => {
            warn!("Field '{name}' has unknown mapping kind {other}; field excluded");
            return None;
        }
    };
    Some(FieldSpec {
        name: name.to_string(),
        source,
        field_type,
    })
}

fn resolve_index(field: &str, value: Option<&str>) -> Option<usize> {
    let Some(raw) = value else {
        warn!("Field '{field}' has no column position; field excluded");
        return None;
    };
    match raw.trim().parse::<i64>() {
        Ok(position) if position >= 1 => usize::try_from(position - 1).ok(),
        Ok(position) => {
            warn!("Field '{field}' has column position {position}, positions start at 1; field excluded");
            None
        }
        Err(err) => {
            warn!("Field '{field}' has unparsable column position '{raw}': {err}; field excluded");
            None
        }
    }
}

//! Form blueprints: ordered steps per template, and the registry that holds
//! them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::schema::{FieldSchema, FieldSpec};
use crate::value::FieldId;

/// One screen of the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub fields: Vec<FieldId>,
    /// A `Group` field whose rows the UI adds and removes on this step.
    #[serde(default)]
    pub repeat_group: Option<FieldId>,
}

impl Step {
    pub fn new(name: &str, title: &str, subtitle: &str) -> Self {
        Step {
            name: name.to_string(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            fields: Vec::new(),
            repeat_group: None,
        }
    }

    pub fn fields(mut self, ids: &[&str]) -> Self {
        self.fields.extend(ids.iter().map(|id| FieldId::from(*id)));
        self
    }

    pub fn repeat(mut self, group: &str) -> Self {
        self.repeat_group = Some(FieldId::from(group));
        self
    }

    /// Plain fields first, then the repeat group.
    pub fn field_ids(&self) -> impl Iterator<Item = &FieldId> {
        self.fields.iter().chain(self.repeat_group.iter())
    }

    pub fn collects(&self, id: &str) -> bool {
        self.field_ids().any(|f| f.as_str() == id)
    }
}

/// The ordered step sequence for one form layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub gov_form_code: Option<String>,
    /// Template PDF, relative to the configured template directory.
    pub template_file: String,
    pub steps: Vec<Step>,
}

impl Blueprint {
    /// Every FieldSpec the blueprint touches, group row fields included,
    /// in step order.
    pub fn field_specs(&self, schema: &FieldSchema) -> Result<Vec<FieldSpec>, FormError> {
        let mut seen = BTreeSet::new();
        let mut specs = Vec::new();
        for id in self.steps.iter().flat_map(Step::field_ids) {
            let spec = schema.lookup(id.as_str())?;
            let rows = spec
                .group_spec()
                .map(|g| g.row_fields.as_slice())
                .unwrap_or_default();
            for id in std::iter::once(id).chain(rows) {
                if seen.insert(id.clone()) {
                    specs.push(schema.lookup(id.as_str())?.clone());
                }
            }
        }
        Ok(specs)
    }
}

/// Blueprints keyed by template name. Filled at startup, read-only after.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    blueprints: BTreeMap<String, Blueprint>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blueprint after checking that every field it names exists
    /// in `schema`.
    pub fn register(&mut self, schema: &FieldSchema, blueprint: Blueprint) -> Result<(), FormError> {
        if self.blueprints.contains_key(&blueprint.name) {
            return Err(FormError::DuplicateTemplate(blueprint.name));
        }

        for step in &blueprint.steps {
            for id in &step.fields {
                schema.lookup(id.as_str())?;
            }
            if let Some(group) = &step.repeat_group {
                if !schema.lookup(group.as_str())?.kind.is_group() {
                    return Err(FormError::NotAGroup(group.to_string()));
                }
            }
        }

        self.blueprints.insert(blueprint.name.clone(), blueprint);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Blueprint, FormError> {
        self.blueprints
            .get(name)
            .ok_or_else(|| FormError::UnknownTemplate(name.to_string()))
    }

    pub fn steps_for(&self, name: &str) -> Result<&[Step], FormError> {
        Ok(&self.get(name)?.steps)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blueprints.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.values()
    }
}

/// The field schema plus every blueprint built on it.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub schema: FieldSchema,
    pub registry: TemplateRegistry,
}

impl Catalog {
    pub fn new(fields: Vec<FieldSpec>, blueprints: Vec<Blueprint>) -> Result<Self, FormError> {
        let schema = FieldSchema::new(fields)?;
        let mut registry = TemplateRegistry::new();
        for blueprint in blueprints {
            registry.register(&schema, blueprint)?;
        }
        Ok(Catalog { schema, registry })
    }

    pub fn steps_for(&self, name: &str) -> Result<&[Step], FormError> {
        self.registry.steps_for(name)
    }

    pub fn blueprint(&self, name: &str) -> Result<&Blueprint, FormError> {
        self.registry.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSource, DateFormat, GroupColumn, GroupSpec};

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::text("full_name", "Name"),
            FieldSpec::date("dob", "Birth date", DateFormat::Iso),
            FieldSpec::text("work_unit", "Unit"),
            FieldSpec::group(
                "work",
                "Work",
                GroupSpec {
                    row_fields: vec!["work_unit".into()],
                    columns: vec![GroupColumn {
                        x_offset: 0.0,
                        source: ColumnSource::Field {
                            field: "work_unit".into(),
                        },
                    }],
                    row_height: 20.0,
                    capacity: 2,
                    font_size: None,
                },
            ),
        ]
    }

    fn blueprint(name: &str) -> Blueprint {
        Blueprint {
            name: name.to_string(),
            title: "Test".to_string(),
            description: String::new(),
            gov_form_code: None,
            template_file: "test.pdf".to_string(),
            steps: vec![
                Step::new("identity", "Identity", "").fields(&["full_name", "dob"]),
                Step::new("work", "Work", "").repeat("work"),
            ],
        }
    }

    #[test]
    fn test_steps_for_registered_template() {
        let catalog = Catalog::new(fields(), vec![blueprint("cv")]).unwrap();
        let steps = catalog.steps_for("cv").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "identity");
    }

    #[test]
    fn test_steps_for_unregistered_template() {
        let catalog = Catalog::new(fields(), vec![blueprint("cv")]).unwrap();
        assert_eq!(
            catalog.steps_for("unregistered-template").unwrap_err(),
            FormError::UnknownTemplate("unregistered-template".into())
        );
    }

    #[test]
    fn test_register_rejects_unknown_field() {
        let mut bp = blueprint("cv");
        bp.steps[0].fields.push("nickname".into());
        let result = Catalog::new(fields(), vec![bp]);
        assert_eq!(result.unwrap_err(), FormError::UnknownField("nickname".into()));
    }

    #[test]
    fn test_register_rejects_non_group_repeat() {
        let mut bp = blueprint("cv");
        bp.steps[1].repeat_group = Some("full_name".into());
        let result = Catalog::new(fields(), vec![bp]);
        assert_eq!(result.unwrap_err(), FormError::NotAGroup("full_name".into()));
    }

    #[test]
    fn test_register_rejects_duplicate_name() {
        let result = Catalog::new(fields(), vec![blueprint("cv"), blueprint("cv")]);
        assert_eq!(result.unwrap_err(), FormError::DuplicateTemplate("cv".into()));
    }

    #[test]
    fn test_step_collects_repeat_group() {
        let bp = blueprint("cv");
        assert!(bp.steps[1].collects("work"));
        assert!(!bp.steps[1].collects("work_unit"));
        assert!(bp.steps[0].collects("dob"));
    }

    #[test]
    fn test_field_specs_include_group_rows() {
        let catalog = Catalog::new(fields(), vec![blueprint("cv")]).unwrap();
        let specs = catalog
            .blueprint("cv")
            .unwrap()
            .field_specs(&catalog.schema)
            .unwrap();
        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["full_name", "dob", "work", "work_unit"]);
    }

    #[test]
    fn test_names_sorted() {
        let catalog = Catalog::new(fields(), vec![blueprint("b"), blueprint("a")]).unwrap();
        let names: Vec<&str> = catalog.registry.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

//! Resume-data field catalog: the tree of bindable slots and its flattened form.

use serde::{Deserialize, Serialize};

/// Declared value kind of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Array,
    Object,
    Boolean,
    Date,
}

impl FieldKind {
    pub fn has_children(self) -> bool {
        matches!(self, FieldKind::Array | FieldKind::Object)
    }
}

/// One bindable slot in the resume-data schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataField {
    /// Dotted/bracketed address, e.g. `workExperience[].jobTitle`.
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: FieldKind,
    /// Only populated for `object` and `array` kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataField>,
}

impl DataField {
    pub fn new(path: &str, name: &str, kind: FieldKind) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            description: None,
            kind,
            children: Vec::new(),
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Attaches nested fields. Ignored for scalar kinds.
    pub fn with_children(mut self, children: Vec<DataField>) -> Self {
        if self.kind.has_children() {
            self.children = children;
        }
        self
    }
}

/// A catalog entry as the matcher sees it: one per node of the field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatField {
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FlatField {
    /// Whether the path addresses elements of a collection (`items[].x`).
    pub fn is_array_path(&self) -> bool {
        self.path.contains("[]")
    }

    /// Path text before the first `[`.
    pub fn array_base(&self) -> &str {
        self.path.split('[').next().unwrap_or(&self.path)
    }
}

/// How child paths are written into the flattened catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStyle {
    /// Each node keeps its own declared path verbatim.
    #[default]
    Declared,
    /// Children are prefixed with their parent's path (`parent.child`, or
    /// `parent[].child` under an array) unless already prefixed.
    Qualified,
}

/// Flattens the field tree in pre-order: every parent precedes its descendants.
pub fn flatten_fields(fields: &[DataField], style: PathStyle) -> Vec<FlatField> {
    let mut out = Vec::new();
    for field in fields {
        flatten_into(field, &field.path, style, &mut out);
    }
    out
}

fn flatten_into(field: &DataField, path: &str, style: PathStyle, out: &mut Vec<FlatField>) {
    out.push(FlatField {
        path: path.to_string(),
        name: field.name.clone(),
        description: field.description.clone(),
    });

    for child in &field.children {
        let child_path = match style {
            PathStyle::Declared => child.path.clone(),
            PathStyle::Qualified => qualify(path, field.kind, &child.path),
        };
        flatten_into(child, &child_path, style, out);
    }
}

fn qualify(parent_path: &str, parent_kind: FieldKind, child_path: &str) -> String {
    let base = if parent_kind == FieldKind::Array && !parent_path.ends_with("[]") {
        format!("{parent_path}[]")
    } else {
        parent_path.to_string()
    };
    let prefix = format!("{base}.");
    if child_path.starts_with(&prefix) {
        child_path.to_string()
    } else {
        format!("{prefix}{child_path}")
    }
}

/// The resume-data schema that templates bind against.
pub fn resume_schema() -> Vec<DataField> {
    use FieldKind::{Array, Boolean, Date, Number};

    vec![
        DataField::new("firstName", "First Name", FieldKind::String),
        DataField::new("lastName", "Last Name", FieldKind::String),
        DataField::new("profession", "Profession", FieldKind::String)
            .described("Job title shown under the candidate's name"),
        DataField::new("email", "Email", FieldKind::String).described("Contact email address"),
        DataField::new("phone", "Phone", FieldKind::String).described("Contact phone number"),
        DataField::new("city", "City", FieldKind::String),
        DataField::new("country", "Country", FieldKind::String),
        DataField::new("postalCode", "Postal Code", FieldKind::String),
        DataField::new("website", "Website", FieldKind::String).described("Personal website or portfolio"),
        DataField::new("linkedin", "LinkedIn", FieldKind::String).described("LinkedIn profile URL"),
        DataField::new("photo", "Photo", FieldKind::String).described("Profile picture URL"),
        DataField::new("summary", "Professional Summary", FieldKind::String)
            .described("Short profile paragraph at the top of the resume"),
        DataField::new("workExperience", "Work Experience", Array)
            .described("Employment history, most recent first")
            .with_children(vec![
                DataField::new("workExperience[].jobTitle", "Job Title", FieldKind::String),
                DataField::new("workExperience[].employer", "Employer", FieldKind::String)
                    .described("Company or organisation name"),
                DataField::new("workExperience[].city", "Work City", FieldKind::String),
                DataField::new("workExperience[].startDate", "Start Date", Date),
                DataField::new("workExperience[].endDate", "End Date", Date)
                    .described("Empty while the position is current"),
                DataField::new("workExperience[].description", "Responsibilities", FieldKind::String)
                    .described("Achievements and duties in this role"),
            ]),
        DataField::new("education", "Education", Array)
            .described("Schools, degrees and diplomas")
            .with_children(vec![
                DataField::new("education[].school", "School", FieldKind::String)
                    .described("University or institution name"),
                DataField::new("education[].degree", "Degree", FieldKind::String),
                DataField::new("education[].fieldOfStudy", "Field of Study", FieldKind::String),
                DataField::new("education[].graduationDate", "Graduation Date", Date),
                DataField::new("education[].description", "Education Details", FieldKind::String),
            ]),
        DataField::new("skills", "Skills", Array).with_children(vec![
            DataField::new("skills[].name", "Skill", FieldKind::String),
            DataField::new("skills[].level", "Skill Level", Number)
                .described("Proficiency from 1 to 5"),
        ]),
        DataField::new("languages", "Languages", Array).with_children(vec![
            DataField::new("languages[].name", "Language", FieldKind::String),
            DataField::new("languages[].proficiency", "Language Proficiency", FieldKind::String),
        ]),
        DataField::new("certifications", "Certifications", Array).with_children(vec![
            DataField::new("certifications[].name", "Certification", FieldKind::String),
            DataField::new("certifications[].issuer", "Issuer", FieldKind::String),
            DataField::new("certifications[].date", "Certification Date", Date),
        ]),
        DataField::new("hobbies", "Hobbies", FieldKind::String).described("Interests outside work"),
        DataField::new("hasReferences", "References Available", Boolean)
            .described("Whether references are available on request"),
    ]
}

use serde::{Deserialize, Serialize};

/// One required field of a campaign record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    /// Question shown to the model when asking for this field.
    pub description: String,
    /// Example marker value used in the generated prompt.
    pub example: String,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            example: example.into(),
        }
    }
}

/// Closed, ordered set of fields a campaign must eventually have values for.
///
/// Declaration order is significant: it drives `missing_fields` ordering and the
/// serialized layout of [`crate::CampaignState`].
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSchema {
    fields: Vec<FieldSpec>,
}

impl CampaignSchema {
    /// Build a schema from field specs. Later duplicates of a name are ignored.
    pub fn new(specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        let mut fields: Vec<FieldSpec> = Vec::new();
        for spec in specs {
            if fields.iter().any(|existing| existing.name == spec.name) {
                log::warn!("Ignoring duplicate schema field '{}'", spec.name);
                continue;
            }
            fields.push(spec);
        }
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for CampaignSchema {
    fn default() -> Self {
        Self::new([
            FieldSpec::new(
                "audience",
                "Who is the target audience?",
                "Small business owners in the tech sector",
            ),
            FieldSpec::new(
                "background",
                "What is the background or context for this campaign?",
                "We are launching a new AI feature",
            ),
            FieldSpec::new(
                "offer",
                "What is the specific offer or proposition?",
                "50% off for the first 3 months",
            ),
            FieldSpec::new(
                "examples",
                "Are there any examples or references to follow?",
                "Like the recent Slack campaign",
            ),
            FieldSpec::new(
                "description",
                "A brief description of the campaign.",
                "A colder outreach campaign for our new SaaS product",
            ),
            FieldSpec::new(
                "companySize",
                "What is the target company size?",
                "10-50 employees",
            ),
            FieldSpec::new(
                "industry",
                "What industry are we targeting?",
                "SaaS, Technology",
            ),
            FieldSpec::new(
                "targetRoles",
                "What are the target job titles or roles?",
                "CTO, VP of Engineering",
            ),
            FieldSpec::new(
                "valueProp",
                "What is the unique value being offered?",
                "Premium coffee subscription delivered fresh weekly",
            ),
            FieldSpec::new(
                "painPoints",
                "What problems does this solve for the audience? (as an array)",
                r#"["Lack of time to visit coffee shops", "Inconsistent coffee quality"]"#,
            ),
            FieldSpec::new(
                "cta",
                "What should the audience do? (call-to-action)",
                "Start your free trial today",
            ),
            FieldSpec::new(
                "constraints",
                "Any pricing, geography, timing, or other limitations?",
                "US only, minimum 3-month subscription",
            ),
            FieldSpec::new(
                "communicationTone",
                "What tone should the campaign use? (professional, casual, humorous, etc.)",
                "casual",
            ),
            FieldSpec::new(
                "anythingElse",
                "Any other relevant details or specific instructions?",
                "Avoid using buzzwords",
            ),
        ])
    }
}

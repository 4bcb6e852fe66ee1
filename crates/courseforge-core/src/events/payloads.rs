//! Typed payloads decoded from `preview_data.data`.
//!
//! Field names follow the server's snake_case; camelCase spellings are
//! accepted as aliases. Optional fields are the unit of partial patching:
//! `None` means "not carried by this event", never "reset".

use serde::{Deserialize, Deserializer};

use crate::domain::{ItemStatus, ResourceSummary};

/// Ids arrive as strings or bare integers depending on the server build.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TopicSet {
    pub topic: String,
}

/// One entry of `search_queries_generated`: a bare string or an object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueryEntry {
    Text(String),
    Detailed {
        #[serde(alias = "query")]
        text: String,
        #[serde(default)]
        status: Option<ItemStatus>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SearchQueriesGenerated {
    #[serde(alias = "search_queries", alias = "searchQueries")]
    pub queries: Vec<QueryEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModuleOutline {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModulesDefined {
    pub modules: Vec<ModuleOutline>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmoduleOutline {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModuleSubmodulesPlanned {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    pub submodules: Vec<SubmoduleOutline>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModuleRef {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmoduleRef {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    #[serde(alias = "submoduleId", deserialize_with = "string_or_number")]
    pub submodule_id: String,
}

/// Field-level patch for one submodule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SubmodulePatch {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    #[serde(alias = "submoduleId", deserialize_with = "string_or_number")]
    pub submodule_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default, alias = "resourceStatus")]
    pub resource_status: Option<ItemStatus>,
    #[serde(default, alias = "resourceCount")]
    pub resource_count: Option<u32>,
    #[serde(default, alias = "quizQuestionCount")]
    pub quiz_question_count: Option<u32>,
    #[serde(default, alias = "searchResultCount")]
    pub search_result_count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmoduleFailure {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    #[serde(alias = "submoduleId", deserialize_with = "string_or_number")]
    pub submodule_id: String,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

/// Patch for a resource collection (topic or module level).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ResourcePatch {
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default, alias = "resource_count", alias = "resourceCount")]
    pub count: Option<u32>,
    #[serde(default, alias = "resources", alias = "resource_preview")]
    pub preview: Option<Vec<ResourceSummary>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModuleResourcePatch {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    #[serde(flatten)]
    pub patch: ResourcePatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmoduleResourcePatch {
    #[serde(alias = "moduleId", deserialize_with = "string_or_number")]
    pub module_id: String,
    #[serde(alias = "submoduleId", deserialize_with = "string_or_number")]
    pub submodule_id: String,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default, alias = "resource_count", alias = "resourceCount")]
    pub count: Option<u32>,
}

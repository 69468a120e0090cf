//! Domain types shared by the store, merge and match stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Synthetic per-run case identifier. Unique within one pipeline run and
/// the join key between pool entries, match results, and case folders.
pub type GroupId = i64;

/// Group id stamped on ad-hoc query cases built outside the corpus walk.
pub const QUERY_GROUP_ID: GroupId = -1;

/// Embedding space partition. Each category has its own embedding
/// function and therefore its own vector dimensionality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "CODE")]
    Code,
    #[serde(rename = "TEXT")]
    Text,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Code, Category::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Code => "CODE",
            Category::Text => "TEXT",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anti-pattern family. The family fixes the closed chunk-type vocabulary
/// every case below it must draw from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Family {
    #[serde(rename = "CH")]
    Ch,
    #[serde(rename = "MH")]
    Mh,
    #[serde(rename = "AWD")]
    Awd,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Ch => "CH",
            Family::Mh => "MH",
            Family::Awd => "AWD",
        }
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Family> {
        match s {
            "CH" => Ok(Family::Ch),
            "MH" => Ok(Family::Mh),
            "AWD" => Ok(Family::Awd),
            other => Err(Error::Schema(format!(
                "unknown anti-pattern family '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunk roles of the CH family. Fine-grained roles come from the AST
/// splitter, `superClass`/`subClass` from the whole-file splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChChunkType {
    ParentMethod,
    ParentCallChild,
    ChildMethod,
    ParentFileStructure,
    ChildFileStructure,
    ParentFileSummary,
    ParentMethodSummary,
    InvocationSummary,
    ChildFileSummary,
    ChildMethodSummary,
    SuperClass,
    SubClass,
}

impl ChChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChChunkType::ParentMethod => "parent_method",
            ChChunkType::ParentCallChild => "parent_call_child",
            ChChunkType::ChildMethod => "child_method",
            ChChunkType::ParentFileStructure => "parent_file_structure",
            ChChunkType::ChildFileStructure => "child_file_structure",
            ChChunkType::ParentFileSummary => "parent_file_summary",
            ChChunkType::ParentMethodSummary => "parent_method_summary",
            ChChunkType::InvocationSummary => "invocation_summary",
            ChChunkType::ChildFileSummary => "child_file_summary",
            ChChunkType::ChildMethodSummary => "child_method_summary",
            ChChunkType::SuperClass => "superClass",
            ChChunkType::SubClass => "subClass",
        }
    }

    pub fn parse(label: &str) -> Option<ChChunkType> {
        match label {
            "parent_method" => Some(ChChunkType::ParentMethod),
            "parent_call_child" => Some(ChChunkType::ParentCallChild),
            "child_method" => Some(ChChunkType::ChildMethod),
            "parent_file_structure" => Some(ChChunkType::ParentFileStructure),
            "child_file_structure" => Some(ChChunkType::ChildFileStructure),
            "parent_file_summary" => Some(ChChunkType::ParentFileSummary),
            "parent_method_summary" => Some(ChChunkType::ParentMethodSummary),
            "invocation_summary" => Some(ChChunkType::InvocationSummary),
            "child_file_summary" => Some(ChChunkType::ChildFileSummary),
            "child_method_summary" => Some(ChChunkType::ChildMethodSummary),
            "superClass" => Some(ChChunkType::SuperClass),
            "subClass" => Some(ChChunkType::SubClass),
            _ => None,
        }
    }
}

/// Chunk roles of the MH family (class roles along the hierarchy path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MhChunkType {
    SuperClass,
    IntermediateClass,
    SubClass,
}

impl MhChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            MhChunkType::SuperClass => "superClass",
            MhChunkType::IntermediateClass => "intermediateClass",
            MhChunkType::SubClass => "subClass",
        }
    }

    pub fn parse(label: &str) -> Option<MhChunkType> {
        match label {
            "superClass" => Some(MhChunkType::SuperClass),
            "intermediateClass" => Some(MhChunkType::IntermediateClass),
            "subClass" => Some(MhChunkType::SubClass),
            _ => None,
        }
    }
}

/// Chunk roles of the AWD family. Fine-grained roles come from the AST
/// splitter, the three class roles from the whole-file splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwdChunkType {
    SuperParentMethod,
    SuperChildMethod,
    SuperInvocation,
    SubParentMethod,
    SubChildMethod,
    SubInvocation,
    ClientClass,
    SuperType,
    SubType,
}

impl AwdChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            AwdChunkType::SuperParentMethod => "super_parent_method",
            AwdChunkType::SuperChildMethod => "super_child_method",
            AwdChunkType::SuperInvocation => "super_invocation",
            AwdChunkType::SubParentMethod => "sub_parent_method",
            AwdChunkType::SubChildMethod => "sub_child_method",
            AwdChunkType::SubInvocation => "sub_invocation",
            AwdChunkType::ClientClass => "clientClass",
            AwdChunkType::SuperType => "superType",
            AwdChunkType::SubType => "subType",
        }
    }

    pub fn parse(label: &str) -> Option<AwdChunkType> {
        match label {
            "super_parent_method" => Some(AwdChunkType::SuperParentMethod),
            "super_child_method" => Some(AwdChunkType::SuperChildMethod),
            "super_invocation" => Some(AwdChunkType::SuperInvocation),
            "sub_parent_method" => Some(AwdChunkType::SubParentMethod),
            "sub_child_method" => Some(AwdChunkType::SubChildMethod),
            "sub_invocation" => Some(AwdChunkType::SubInvocation),
            "clientClass" => Some(AwdChunkType::ClientClass),
            "superType" => Some(AwdChunkType::SuperType),
            "subType" => Some(AwdChunkType::SubType),
            _ => None,
        }
    }
}

/// A chunk-type label resolved against its family's vocabulary.
///
/// On the wire the label stays a raw string; records are resolved when
/// pools are built so unknown labels drop out of the pipeline with a
/// warning instead of failing a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Ch(ChChunkType),
    Mh(MhChunkType),
    Awd(AwdChunkType),
}

impl ChunkType {
    pub fn parse(family: Family, label: &str) -> Option<ChunkType> {
        match family {
            Family::Ch => ChChunkType::parse(label).map(ChunkType::Ch),
            Family::Mh => MhChunkType::parse(label).map(ChunkType::Mh),
            Family::Awd => AwdChunkType::parse(label).map(ChunkType::Awd),
        }
    }

    pub fn family(self) -> Family {
        match self {
            ChunkType::Ch(_) => Family::Ch,
            ChunkType::Mh(_) => Family::Mh,
            ChunkType::Awd(_) => Family::Awd,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Ch(t) => t.as_str(),
            ChunkType::Mh(t) => t.as_str(),
            ChunkType::Awd(t) => t.as_str(),
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cataloged case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CaseKey {
    pub antipattern_type: Family,
    pub project_name: String,
    pub commit_number: String,
    pub id: String,
}

impl CaseKey {
    /// Relative folder of this case under a dataset root:
    /// `<antipattern_type>/<project>/<commit>/<id>`.
    pub fn folder_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.antipattern_type.as_str(),
            self.project_name,
            self.commit_number,
            self.id
        )
    }
}

/// One persisted metadata record, parallel to one vector in a store.
///
/// - the identity fields tie the record back to its case folder
/// - `chunk_type` keeps the raw splitter label; `resolved_type` checks it
///   against the family vocabulary
/// - `chunk_id` falls back to the chunk-type label when the splitter did
///   not assign one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    pub antipattern_type: Family,
    pub project_name: String,
    pub commit_number: String,
    pub id: String,
    pub group_id: GroupId,
    #[serde(default)]
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub level: i64,
    pub chunk_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_chunk_id: Option<String>,
}

impl ChunkMeta {
    pub fn case_key(&self) -> CaseKey {
        CaseKey {
            antipattern_type: self.antipattern_type,
            project_name: self.project_name.clone(),
            commit_number: self.commit_number.clone(),
            id: self.id.clone(),
        }
    }

    pub fn folder_path(&self) -> String {
        self.case_key().folder_path()
    }

    pub fn resolved_type(&self) -> Option<ChunkType> {
        self.chunk_type
            .as_deref()
            .and_then(|label| ChunkType::parse(self.antipattern_type, label))
    }
}

/// One chunk entry of a splitter-produced case document.
///
/// At most one content field per category is expected: `ast_subtree`
/// carries CODE content, `llm_description` carries TEXT content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseChunk {
    pub file_path: String,
    #[serde(default)]
    pub chunk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub level: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_subtree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_description: Option<String>,
}

impl CaseChunk {
    /// The content this chunk contributes to `category`, if any.
    pub fn content(&self, category: Category) -> Option<&str> {
        match category {
            Category::Code => self.ast_subtree.as_deref(),
            Category::Text => self.llm_description.as_deref(),
        }
    }
}

// Splitters stamp -1 for identity fields they cannot resolve on ad-hoc
// query cases, so identity must accept bare integers as well as strings.
fn string_or_int<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Num(i64),
    }

    Ok(match Raw::deserialize(de)? {
        Raw::Text(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

/// A full case document as produced by the external splitter
/// (the `*_chunk.json` file inside a case folder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    pub antipattern_type: Family,
    #[serde(deserialize_with = "string_or_int")]
    pub project_name: String,
    #[serde(deserialize_with = "string_or_int")]
    pub commit_number: String,
    #[serde(deserialize_with = "string_or_int")]
    pub id: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub chunks: Vec<CaseChunk>,
}

impl CaseDocument {
    pub fn load(path: &Path) -> Result<CaseDocument> {
        let raw = std::fs::read_to_string(path)?;
        let doc = serde_json::from_str(&raw)?;
        Ok(doc)
    }

    pub fn case_key(&self) -> CaseKey {
        CaseKey {
            antipattern_type: self.antipattern_type,
            project_name: self.project_name.clone(),
            commit_number: self.commit_number.clone(),
            id: self.id.clone(),
        }
    }
}

//! Declarative endpoint descriptors and the catalog that indexes them.

pub mod catalog;
pub mod schema;

pub use catalog::OperationCatalog;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream API surface an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    Manage,
    Audit,
    Connectors,
}

impl ApiSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiSource::Manage => "manage",
            ApiSource::Audit => "audit",
            ApiSource::Connectors => "connectors",
        }
    }
}

impl fmt::Display for ApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    pub fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    pub kind: PrimitiveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_kind: Option<PrimitiveKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Json,
    Multipart,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub kind: PrimitiveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDescriptor {
    #[serde(default)]
    pub required: bool,
    pub content_type: String,
    pub kind: BodyKind,
    #[serde(default)]
    pub fields: Vec<BodyField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_field_name: Option<String>,
}

/// One callable endpoint. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub tool_name: String,
    pub source: ApiSource,
    pub method: HttpMethod,
    pub path: String,
    pub operation_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub is_mutation: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDescriptor>,
}

impl OperationDescriptor {
    pub fn query_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
    }

    /// Name of the multipart file field, when the body carries a file.
    pub fn file_field(&self) -> Option<&str> {
        self.request_body
            .as_ref()
            .filter(|body| body.kind == BodyKind::Multipart)
            .and_then(|body| body.file_field_name.as_deref())
    }

    /// `{name}` placeholders in the path template, in order.
    pub fn path_placeholders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    out.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        out
    }
}

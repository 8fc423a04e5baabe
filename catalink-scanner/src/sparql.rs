//! SPARQL wire types: result rows, triples and the update statements built from them.

use serde::{Deserialize, Serialize};

/// Query issued against every catalog to dump its whole dataset.
pub const FULL_DUMP_QUERY: &str = "SELECT ?s ?p ?o WHERE { ?s ?p ?o . }";

pub const SPARQL_QUERY_CONTENT_TYPE: &str = "application/sparql-query";
pub const SPARQL_UPDATE_CONTENT_TYPE: &str = "application/sparql-update";
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Uri,
    Literal,
    TypedLiteral,
    Bnode,
}

/// One bound value in a SPARQL JSON result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdfTerm {
    #[serde(rename = "type")]
    pub kind: TermKind,
    pub value: String,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

impl RdfTerm {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Uri,
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    pub fn is_uri(&self) -> bool {
        self.kind == TermKind::Uri
    }

    /// Render the term in object position of a SPARQL statement.
    pub fn to_sparql(&self) -> String {
        match self.kind {
            TermKind::Uri => format!("<{}>", self.value),
            _ => {
                let quoted = format!("'{}'", escape_literal(&self.value));
                match (&self.lang, &self.datatype) {
                    (Some(lang), _) => format!("{quoted}@{lang}"),
                    (None, Some(datatype)) => format!("{quoted}^^<{datatype}>"),
                    (None, None) => quoted,
                }
            }
        }
    }
}

/// A subject/predicate/object row of the full-dump query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    #[serde(rename = "s")]
    pub subject: RdfTerm,
    #[serde(rename = "p")]
    pub predicate: RdfTerm,
    #[serde(rename = "o")]
    pub object: RdfTerm,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: RdfTerm) -> Self {
        Self {
            subject: RdfTerm::uri(subject),
            predicate: RdfTerm::uri(predicate),
            object,
        }
    }

    /// `INSERT DATA { <s> <p> o }` for this triple.
    pub fn insert_data(&self) -> String {
        format!(
            "INSERT DATA {{ <{}> <{}> {} }}",
            self.subject.value,
            self.predicate.value,
            self.object.to_sparql()
        )
    }

    /// Exact-match lookup across all named graphs.
    pub fn exists_query(&self) -> String {
        format!(
            "SELECT * {{ GRAPH ?g {{ <{}> <{}> {} }}}}",
            self.subject.value,
            self.predicate.value,
            self.object.to_sparql()
        )
    }
}

/// Escape a literal for single-quoted SPARQL strings.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// SPARQL 1.1 JSON results document, restricted to what the crawler reads.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectResponse {
    pub results: ResultSet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub bindings: Vec<Triple>,
}

/// Generic JSON results used for existence checks, where rows have arbitrary variables.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingsResponse {
    pub results: RawResultSet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResultSet {
    pub bindings: Vec<serde_json::Map<String, serde_json::Value>>,
}

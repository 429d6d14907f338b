// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Structured name types for functions and function namespaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// The name of a function namespace: a catalog paired with a schema.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogSchemaName {
    /// The catalog name.
    pub catalog: String,
    /// The schema name.
    pub schema: String,
}

impl CatalogSchemaName {
    /// Constructs a `CatalogSchemaName` from its parts.
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> CatalogSchemaName {
        CatalogSchemaName {
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }
}

impl fmt::Display for CatalogSchemaName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.catalog, self.schema)
    }
}

/// Identifies the namespace portion of a qualified function name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NamespaceSpecifier {
    /// The ambient namespace, which hosts the built-in functions and is
    /// named by omission: a bare function name always refers here, and
    /// only here.
    Ambient,
    /// An explicitly named catalog-hosted namespace.
    Catalog(CatalogSchemaName),
}

impl NamespaceSpecifier {
    /// Returns the catalog/schema name, if this is a named namespace.
    pub fn catalog_schema(&self) -> Option<&CatalogSchemaName> {
        match self {
            NamespaceSpecifier::Ambient => None,
            NamespaceSpecifier::Catalog(name) => Some(name),
        }
    }
}

impl fmt::Display for NamespaceSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NamespaceSpecifier::Ambient => f.write_str("<ambient>"),
            NamespaceSpecifier::Catalog(name) => name.fmt(f),
        }
    }
}

/// The fully resolved name of a function.
///
/// Two names refer to the same function family iff they are structurally
/// equal.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedFunctionName {
    /// The namespace the function lives in.
    pub namespace: NamespaceSpecifier,
    /// The function's name within the namespace.
    pub item: String,
}

impl QualifiedFunctionName {
    /// Constructs a name in the ambient (built-in) namespace.
    pub fn builtin(item: impl Into<String>) -> QualifiedFunctionName {
        QualifiedFunctionName {
            namespace: NamespaceSpecifier::Ambient,
            item: item.into(),
        }
    }

    /// Constructs a fully qualified name in an explicit namespace.
    pub fn qualified(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        item: impl Into<String>,
    ) -> QualifiedFunctionName {
        QualifiedFunctionName {
            namespace: NamespaceSpecifier::Catalog(CatalogSchemaName::new(catalog, schema)),
            item: item.into(),
        }
    }
}

impl fmt::Display for QualifiedFunctionName {
    /// Displays the concise form: ambient names print bare, qualified
    /// names print all three parts.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            NamespaceSpecifier::Ambient => f.write_str(&self.item),
            NamespaceSpecifier::Catalog(name) => write!(f, "{}.{}", name, self.item),
        }
    }
}

/// A function name as written at a call site, before namespace
/// resolution: either bare, or qualified by exactly catalog and schema.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PartialFunctionName {
    /// The catalog name, if the name was qualified.
    pub catalog: Option<String>,
    /// The schema name, if the name was qualified.
    pub schema: Option<String>,
    /// The function's name.
    pub item: String,
}

impl PartialFunctionName {
    /// Resolves this name to a [`QualifiedFunctionName`].
    ///
    /// Bare names resolve into the ambient namespace. Qualified names must
    /// carry both a catalog and a schema; a name with only one qualifier
    /// is rejected, since there is no search path to complete it.
    pub fn to_qualified(&self) -> Result<QualifiedFunctionName, ResolutionError> {
        match (&self.catalog, &self.schema) {
            (None, None) => Ok(QualifiedFunctionName::builtin(&self.item)),
            (Some(catalog), Some(schema)) => {
                Ok(QualifiedFunctionName::qualified(catalog, schema, &self.item))
            }
            _ => Err(ResolutionError::InvalidFunctionName {
                name: self.to_string(),
            }),
        }
    }
}

impl FromStr for PartialFunctionName {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<PartialFunctionName, ResolutionError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(ResolutionError::InvalidFunctionName {
                name: s.to_string(),
            });
        }
        match parts.as_slice() {
            [item] => Ok(PartialFunctionName {
                catalog: None,
                schema: None,
                item: item.to_string(),
            }),
            [catalog, schema, item] => Ok(PartialFunctionName {
                catalog: Some(catalog.to_string()),
                schema: Some(schema.to_string()),
                item: item.to_string(),
            }),
            _ => Err(ResolutionError::InvalidFunctionName {
                name: s.to_string(),
            }),
        }
    }
}

impl From<QualifiedFunctionName> for PartialFunctionName {
    fn from(name: QualifiedFunctionName) -> PartialFunctionName {
        match name.namespace {
            NamespaceSpecifier::Ambient => PartialFunctionName {
                catalog: None,
                schema: None,
                item: name.item,
            },
            NamespaceSpecifier::Catalog(ns) => PartialFunctionName {
                catalog: Some(ns.catalog),
                schema: Some(ns.schema),
                item: name.item,
            },
        }
    }
}

impl fmt::Display for PartialFunctionName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{}.", catalog)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        f.write_str(&self.item)
    }
}

/// A pattern over catalog/schema names, used by namespace managers to
/// claim ownership of a range of qualified names.
///
/// A prefix either names a whole catalog (`analytics`) or a single schema
/// within it (`analytics.ml`). Among several prefixes that include a
/// target name, the narrowest one wins.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogSchemaPrefix {
    /// The catalog this prefix claims.
    pub catalog: String,
    /// The schema this prefix claims, or `None` to claim every schema in
    /// the catalog.
    pub schema: Option<String>,
}

impl CatalogSchemaPrefix {
    /// Constructs a prefix claiming an entire catalog.
    pub fn catalog(catalog: impl Into<String>) -> CatalogSchemaPrefix {
        CatalogSchemaPrefix {
            catalog: catalog.into(),
            schema: None,
        }
    }

    /// Constructs a prefix claiming a single schema.
    pub fn schema(catalog: impl Into<String>, schema: impl Into<String>) -> CatalogSchemaPrefix {
        CatalogSchemaPrefix {
            catalog: catalog.into(),
            schema: Some(schema.into()),
        }
    }

    /// Reports whether this prefix includes the given namespace name.
    pub fn includes(&self, name: &CatalogSchemaName) -> bool {
        self.catalog == name.catalog
            && self
                .schema
                .as_ref()
                .map_or(true, |schema| *schema == name.schema)
    }

    /// Reports whether every name included by `other` is also included by
    /// `self`.
    pub fn includes_prefix(&self, other: &CatalogSchemaPrefix) -> bool {
        self.catalog == other.catalog
            && match (&self.schema, &other.schema) {
                (None, _) => true,
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => false,
            }
    }
}

impl FromStr for CatalogSchemaPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<CatalogSchemaPrefix, String> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(format!("invalid catalog/schema prefix: {}", s));
        }
        match parts.as_slice() {
            [catalog] => Ok(CatalogSchemaPrefix::catalog(*catalog)),
            [catalog, schema] => Ok(CatalogSchemaPrefix::schema(*catalog, *schema)),
            _ => Err(format!("invalid catalog/schema prefix: {}", s)),
        }
    }
}

impl fmt::Display for CatalogSchemaPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.schema {
            None => f.write_str(&self.catalog),
            Some(schema) => write!(f, "{}.{}", self.catalog, schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogSchemaName, CatalogSchemaPrefix, PartialFunctionName};

    #[test]
    fn test_partial_name_parsing() {
        let bare: PartialFunctionName = "length".parse().unwrap();
        assert_eq!(bare.item, "length");
        assert_eq!(bare.catalog, None);

        let qualified: PartialFunctionName = "analytics.ml.predict".parse().unwrap();
        assert_eq!(qualified.catalog.as_deref(), Some("analytics"));
        assert_eq!(qualified.schema.as_deref(), Some("ml"));
        assert_eq!(qualified.item, "predict");

        for invalid in ["a.b", "a.b.c.d", "", "a..c"] {
            assert!(invalid.parse::<PartialFunctionName>().is_err(), "{}", invalid);
        }
    }

    #[test]
    fn test_prefix_includes() {
        let catalog: CatalogSchemaPrefix = "analytics".parse().unwrap();
        let schema: CatalogSchemaPrefix = "analytics.ml".parse().unwrap();

        let ml = CatalogSchemaName::new("analytics", "ml");
        let stats = CatalogSchemaName::new("analytics", "stats");
        let other = CatalogSchemaName::new("other", "ml");

        assert!(catalog.includes(&ml));
        assert!(catalog.includes(&stats));
        assert!(!catalog.includes(&other));
        assert!(schema.includes(&ml));
        assert!(!schema.includes(&stats));

        assert!(catalog.includes_prefix(&schema));
        assert!(!schema.includes_prefix(&catalog));
        assert!(catalog.includes_prefix(&catalog));
    }

    #[test]
    fn test_qualified_display_is_concise() {
        use super::QualifiedFunctionName;
        assert_eq!(QualifiedFunctionName::builtin("abs").to_string(), "abs");
        assert_eq!(
            QualifiedFunctionName::qualified("analytics", "ml", "predict").to_string(),
            "analytics.ml.predict"
        );
    }
}

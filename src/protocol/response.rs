use std::{collections::BTreeMap, ops::Range};

use serde::{Deserialize, Deserializer};

use super::{HighlightError, request::Mode};

/// Successful answer to a [`Query`](super::Query). The variant always
/// matches the query's [`Mode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Highlighted(Highlighted),
    Scopified(Scopified),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    /// Highlighted HTML version of the submitted code.
    pub data: String,
    /// No grammar matched and the code was rendered as plain text.
    pub plaintext: bool,
    pub detected_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scopified {
    pub detected_language: String,
    pub scope_names: ScopeNames,
    /// Regions in the order the server produced them.
    pub regions: Vec<ScopifiedRegion>,
}

/// A region of the submitted code annotated with the grammar scopes active
/// over it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScopifiedRegion {
    /// Byte offset into the submitted code.
    #[serde(rename = "Offset", alias = "offset", default, deserialize_with = "nullable")]
    pub offset: usize,
    /// Length in bytes.
    #[serde(rename = "Length", alias = "length", default, deserialize_with = "nullable")]
    pub length: usize,
    /// Indexes into [`ScopeNames`].
    #[serde(rename = "Scopes", alias = "scopes", default, deserialize_with = "nullable")]
    pub scopes: Vec<usize>,
}

impl ScopifiedRegion {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(self.length)
    }
}

/// Scope index to scope name.
///
/// The server sends names as a list and regions refer to them by list
/// position. [`ScopeNames::from_ordered`] is the only place that assumption
/// is made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeNames(BTreeMap<usize, String>);

impl ScopeNames {
    pub fn from_ordered(names: Vec<String>) -> Self {
        Self(names.into_iter().enumerate().collect())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    /// Resolve a scope stack, or `None` if any index is unknown.
    pub fn resolve(&self, scopes: &[usize]) -> Option<Vec<&str>> {
        scopes.iter().map(|&i| self.get(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(i, name)| (*i, name.as_str()))
    }
}

impl Scopified {
    /// The slice of `code` covered by `region`. `None` if the region runs
    /// past the end of `code` or does not fall on UTF-8 boundaries.
    pub fn region_text<'c>(code: &'c str, region: &ScopifiedRegion) -> Option<&'c str> {
        let range = region.range();
        if range.end > code.len() {
            return None;
        }
        code.get(range)
    }
}

impl Response {
    pub fn detected_language(&self) -> &str {
        match self {
            Response::Highlighted(h) => &h.detected_language,
            Response::Scopified(s) => &s.detected_language,
        }
    }

    pub fn as_highlighted(&self) -> Option<&Highlighted> {
        match self {
            Response::Highlighted(h) => Some(h),
            Response::Scopified(_) => None,
        }
    }

    pub fn as_scopified(&self) -> Option<&Scopified> {
        match self {
            Response::Scopified(s) => Some(s),
            Response::Highlighted(_) => None,
        }
    }

    pub fn into_highlighted(self) -> Option<Highlighted> {
        match self {
            Response::Highlighted(h) => Some(h),
            Response::Scopified(_) => None,
        }
    }

    pub fn into_scopified(self) -> Option<Scopified> {
        match self {
            Response::Scopified(s) => Some(s),
            Response::Highlighted(_) => None,
        }
    }
}

/// The flat body the server sends, success and error fields together.
/// Field names are accepted in either case and `null` reads as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireResponse {
    #[serde(rename = "Data", alias = "data", deserialize_with = "nullable")]
    data: String,
    #[serde(rename = "Plaintext", alias = "plaintext", deserialize_with = "nullable")]
    plaintext: bool,
    #[serde(alias = "DetectedLanguage", deserialize_with = "nullable")]
    detected_language: String,
    #[serde(alias = "ScopifiedScopeNames", deserialize_with = "nullable")]
    scopified_scope_names: Vec<String>,
    #[serde(alias = "ScopifiedRegions", deserialize_with = "nullable")]
    scopified_regions: Vec<ScopifiedRegion>,

    #[serde(rename = "Error", alias = "error", deserialize_with = "nullable")]
    error: String,
    #[serde(rename = "Code", alias = "code", deserialize_with = "nullable")]
    code: String,
}

impl WireResponse {
    /// Turn the body into a result: a reported error if `error` is set,
    /// otherwise the response shape selected by `mode`.
    pub(crate) fn into_response(
        self,
        server: &str,
        mode: Mode,
    ) -> Result<Response, HighlightError> {
        if !self.error.is_empty() {
            return Err(HighlightError::from_service(server, &self.error, &self.code));
        }

        Ok(match mode {
            Mode::Highlight => Response::Highlighted(Highlighted {
                data: self.data,
                plaintext: self.plaintext,
                detected_language: self.detected_language,
            }),
            Mode::Scopify => Response::Scopified(Scopified {
                detected_language: self.detected_language,
                scope_names: ScopeNames::from_ordered(self.scopified_scope_names),
                regions: self.scopified_regions,
            }),
        })
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

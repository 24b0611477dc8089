use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// How far below the base a search reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

impl Scope {
    pub fn to_ldap3(self) -> ldap3::Scope {
        match self {
            Self::Base => ldap3::Scope::Base,
            Self::OneLevel => ldap3::Scope::OneLevel,
            Self::Subtree => ldap3::Scope::Subtree,
        }
    }
}

/// When the server dereferences aliases during a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerefAliases {
    #[default]
    Never,
    Searching,
    Finding,
    Always,
}

impl DerefAliases {
    pub fn to_ldap3(self) -> ldap3::DerefAliases {
        match self {
            Self::Never => ldap3::DerefAliases::Never,
            Self::Searching => ldap3::DerefAliases::Searching,
            Self::Finding => ldap3::DerefAliases::Finding,
            Self::Always => ldap3::DerefAliases::Always,
        }
    }
}

/// A directory search. No size or time limit is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: Scope,
    pub deref: DerefAliases,
    pub filter: Filter,
    /// Attributes to return. Empty means all user attributes.
    pub attrs: Vec<String>,
}

impl SearchRequest {
    /// Whole-subtree search that never dereferences aliases and returns
    /// every attribute.
    pub fn subtree(base: impl Into<String>, filter: Filter) -> Self {
        Self {
            base: base.into(),
            scope: Scope::Subtree,
            deref: DerefAliases::Never,
            filter,
            attrs: Vec::new(),
        }
    }
}

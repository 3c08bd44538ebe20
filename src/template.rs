use std::collections::HashMap;

use indexmap::IndexMap;

use crate::reference::{ReferenceStore, placeholder};

/// Symbols available for templates, assigned in order.
const SYMBOLS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Table of short symbols standing in for repeated source identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Templates {
    table: IndexMap<String, String>,
    by_url: HashMap<String, String>,
}

impl Templates {
    /// Assign a symbol to every source identifier used by more than
    /// `template_count` remote references.
    ///
    /// Symbols follow the order in which identifiers first appear.
    pub fn assign(store: &ReferenceStore, template_count: usize) -> crate::Result<Self> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for (_, r) in store.remotes() {
            *counts.entry(r.url.as_str()).or_default() += 1;
        }
        let frequent: Vec<&str> = counts
            .into_iter()
            .filter_map(|(url, n)| (n > template_count).then_some(url))
            .collect();
        if frequent.len() > SYMBOLS.len() {
            return Err(crate::Error::TemplateSymbolsExhausted {
                needed: frequent.len(),
                available: SYMBOLS.len(),
            });
        }

        let mut out = Self::default();
        for (url, &sym) in frequent.into_iter().zip(SYMBOLS) {
            let sym = char::from(sym).to_string();
            out.by_url.insert(url.to_string(), sym.clone());
            out.table.insert(sym, url.to_string());
        }
        Ok(out)
    }

    /// The placeholder to write instead of `url`, if it has a symbol.
    pub fn substitute(&self, url: &str) -> Option<String> {
        self.by_url.get(url).map(|s| placeholder(s))
    }

    pub fn into_table(self) -> IndexMap<String, String> {
        self.table
    }
}

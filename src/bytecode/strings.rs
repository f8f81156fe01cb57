use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Something that can turn string literals into stable integer tokens.
pub trait Interner {
    fn intern(&mut self, s: &str) -> u32;
}

/// Module-wide string pool.
///
/// Tokens are dense and handed out in first-seen order; the same text always
/// maps to the same token. The pool is serialized as the ordered list of
/// strings, so token `i` is the `i`-th entry of the constant pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, token: u32) -> Option<&str> {
        self.strings.get(token as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.as_str()))
    }
}

impl Interner for StringTable {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&token) = self.index.get(s) {
            return token;
        }
        let token = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), token);
        token
    }
}

impl From<Vec<String>> for StringTable {
    fn from(strings: Vec<String>) -> Self {
        let index = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        Self { strings, index }
    }
}

impl From<StringTable> for Vec<String> {
    fn from(table: StringTable) -> Self {
        table.strings
    }
}

/// A `StringTable` handle that several function assemblers can intern into
/// from different threads. Lookup-or-insert happens under one lock.
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable(Arc<Mutex<StringTable>>);

impl SharedStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the pool as it is right now.
    pub fn snapshot(&self) -> StringTable {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Interner for SharedStringTable {
    fn intern(&mut self, s: &str) -> u32 {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .intern(s)
    }
}

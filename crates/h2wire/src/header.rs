use crate::error::H2ErrorKind;

/// Insertion-ordered header name/value pairs decoded from one block.
///
/// Names are lowercase on the wire in both block formats; lookup is by
/// exact match. The SPDY variant additionally forbids duplicates, which
/// `insert_unique` enforces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: String, value: String) {
        self.fields.push((name, value));
    }

    pub fn insert_unique(&mut self, name: String, value: String) -> Result<(), H2ErrorKind> {
        if self.contains(&name) {
            return Err(H2ErrorKind::DuplicateHeaderName(name));
        }
        self.fields.push((name, value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Replace the value of an existing field or append a new one. Used when
    /// later response HEADERS (e.g. after a 1xx) update an earlier block.
    pub fn merge(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for HeaderBlock {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Wire-format name validation shared by both block codecs: non-empty and
/// free of uppercase ASCII.
pub(crate) fn validate_name(name: &str) -> Result<(), H2ErrorKind> {
    if name.is_empty() {
        return Err(H2ErrorKind::ZeroLengthHeaderName);
    }
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(H2ErrorKind::UppercaseHeaderName(name.to_string()));
    }
    Ok(())
}

use std::{fmt, sync::Arc};

/// Response keys from the operation root down to a field, e.g. `people.friends.name`.
///
/// Backed by a persistent vector so that every nested scope can hold its own path
/// without copying the prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(im::Vector<Arc<str>>);

impl FieldPath {
    pub fn root(key: &Arc<str>) -> Self {
        FieldPath::default().child(key)
    }

    pub fn child(&self, key: &Arc<str>) -> Self {
        let mut keys = self.0.clone();
        keys.push_back(key.clone());
        FieldPath(keys)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|key| key.as_ref())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<operation>");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

impl serde::Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

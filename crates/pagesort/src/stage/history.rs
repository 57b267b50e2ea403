use serde::{Deserialize, Serialize};

/// Names a finished document has carried, oldest first.
///
/// Never holds two identical entries next to each other.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FileNameHistory(Vec<String>);

impl FileNameHistory {
    pub fn starting_with(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Appends `name` unless it equals the last entry. Returns whether it did.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.0.last() == Some(&name) {
            return false;
        }
        self.0.push(name);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn latest(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileNameHistory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<String>::deserialize(deserializer)?;
        let mut history = FileNameHistory::default();
        for entry in entries {
            history.push(entry);
        }
        Ok(history)
    }
}

/// Drops a leading `<prefix>-` that the user typed back in.
///
/// Display names are shown as `<prefix>-<file_name>`, so an edited display
/// name arrives with the prefix still attached. Only a leading occurrence
/// is removed.
pub fn clean_file_name(raw: &str, prefix: &str) -> String {
    let leading = format!("{}-", prefix);
    match raw.strip_prefix(&leading) {
        Some(rest) => rest.to_string(),
        None => raw.to_string(),
    }
}

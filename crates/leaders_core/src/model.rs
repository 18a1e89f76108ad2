use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Opaque country identifier as listed by the API.
pub type Country = String;

/// One leader object as returned by the API.
///
/// The upstream schema is not validated; fields pass through unchanged and in
/// their original order. The harvester only reads the profile URL field and
/// adds the biography field.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LeaderRecord {
    fields: Map<String, Value>,
}

impl LeaderRecord {
    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Sets `key` to a string value, replacing any previous value.
    pub fn set_text(&mut self, key: &str, text: impl Into<String>) {
        self.fields.insert(key.to_string(), Value::String(text.into()));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Country → leaders mapping accumulated over one run.
///
/// Keeps insertion order and serializes as a single JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaderAggregate {
    entries: Vec<(Country, Vec<LeaderRecord>)>,
}

impl LeaderAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the leaders for `country`. A repeated country keeps its original
    /// position and gets the new leaders.
    pub fn insert(&mut self, country: impl Into<Country>, leaders: Vec<LeaderRecord>) {
        let country = country.into();
        match self.entries.iter_mut().find(|(name, _)| *name == country) {
            Some((_, existing)) => *existing = leaders,
            None => self.entries.push((country, leaders)),
        }
    }

    pub fn get(&self, country: &str) -> Option<&[LeaderRecord]> {
        self.entries
            .iter()
            .find(|(name, _)| name == country)
            .map(|(_, leaders)| leaders.as_slice())
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn leader_count(&self) -> usize {
        self.entries.iter().map(|(_, leaders)| leaders.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Serialize for LeaderAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (country, leaders) in &self.entries {
            map.serialize_entry(country, leaders)?;
        }
        map.end()
    }
}

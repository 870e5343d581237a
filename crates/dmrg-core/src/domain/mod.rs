pub mod errors;

pub use errors::{
    DmrgError, DmrgResult, EXIT_CODE_CATALOG, ErrorCategory, ExitCodeEntry, FailureCategory,
    ParserResult, ProcessExit, SUCCESS_EXIT_CODE,
};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

pub const DMRG_PARAMETER_ORDER: [&str; 8] = [
    "S",
    "N_sites",
    "J",
    "Sz",
    "n_excitations",
    "conserve_symmetry",
    "print_HDF5",
    "maximal_energy",
];

pub const DYNCORR_PARAMETER_ORDER: [&str; 3] = ["J", "N_max", "cutoff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationKind {
    Dmrg,
    DynCorr,
}

impl CalculationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dmrg => "DMRG",
            Self::DynCorr => "DYNCORR",
        }
    }

    pub const fn input_file(self) -> &'static str {
        match self {
            Self::Dmrg => "aiida.inp",
            Self::DynCorr => "dyncorr.inp",
        }
    }

    pub const fn output_file(self) -> &'static str {
        match self {
            Self::Dmrg => "aiida.out",
            Self::DynCorr => "dyncorr.out",
        }
    }

    pub const fn parent_folder_name(self) -> &'static str {
        match self {
            Self::Dmrg => "parent_calc",
            Self::DynCorr => "parent_dmrg",
        }
    }

    /// Canonical positional order of the solver's input tokens.
    pub const fn parameter_order(self) -> &'static [&'static str] {
        match self {
            Self::Dmrg => &DMRG_PARAMETER_ORDER,
            Self::DynCorr => &DYNCORR_PARAMETER_ORDER,
        }
    }

    pub const fn requires_parent_folder(self) -> bool {
        matches!(self, Self::DynCorr)
    }

    pub const fn default_with_mpi(self) -> bool {
        true
    }
}

impl Display for CalculationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(value),
            Self::Float(value) if value.fract() == 0.0 && value.is_finite() => Some(value as i64),
            Self::Float(_) => None,
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Value of one named solver parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Number(Number),
    Text(String),
    Sequence(Vec<Number>),
    Matrix(Vec<Vec<Number>>),
}

impl ParameterValue {
    pub fn sequence<T: Into<Number>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }

    pub fn matrix<T, R>(rows: impl IntoIterator<Item = R>) -> Self
    where
        T: Into<Number>,
        R: IntoIterator<Item = T>,
    {
        Self::Matrix(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(Number::Integer(_)) => "integer",
            Self::Number(Number::Float(_)) => "float",
            Self::Text(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Matrix(_) => "matrix",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Booleans may arrive as literal text from loosely typed parameter files.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            Self::Text(text) => match text.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::Integer(value))
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Number(Number::Float(value))
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Insertion-ordered named parameters for one attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    entries: Vec<(String, ParameterValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replaces an existing value in place, otherwise appends.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Option<ParameterValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<ParameterValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParameterSetVisitor;

        impl<'de> Visitor<'de> for ParameterSetVisitor {
            type Value = ParameterSet;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut set = ParameterSet::new();
                while let Some((key, value)) = access.next_entry::<String, ParameterValue>()? {
                    set.insert(key, value);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(ParameterSetVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HostId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A folder on a specific execution host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFolderRef {
    pub host: HostId,
    pub path: String,
}

impl RemoteFolderRef {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: HostId::new(host),
            path: path.into(),
        }
    }

    pub fn is_colocated_with(&self, host: &HostId) -> bool {
        self.host == *host
    }
}

/// Positional text handed to the solver on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EncodedInput(String);

impl EncodedInput {
    pub(crate) fn new(line: String) -> Self {
        Self(line)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for EncodedInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full text of a retrieved solver log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput(String);

impl RawOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// A configuration value holding exactly one typed variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// UTF-8 string value.
    String(String),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Ordered list of arbitrary JSON values.
    List(Vec<Value>),
    /// String-keyed map of arbitrary JSON values.
    Dict(Map<String, Value>),
}

impl ConfigValue {
    /// Wire field name carrying this variant.
    pub fn field_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string_value",
            ConfigValue::Int(_) => "int_value",
            ConfigValue::Float(_) => "float_value",
            ConfigValue::Bool(_) => "bool_value",
            ConfigValue::List(_) => "list_value",
            ConfigValue::Dict(_) => "dict_value",
        }
    }
}

/// Wire wrapper for config values: `{string_value, int_value, float_value,
/// bool_value, list_value, dict_value}` with at most one field non-null.
///
/// `None` means "no value set" and serializes with every field null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigValueWrapper(pub Option<ConfigValue>);

impl ConfigValueWrapper {
    /// Wrapper representing an unset value.
    pub fn unset() -> Self {
        Self(None)
    }

    /// Returns the wrapped value, if any.
    pub fn value(&self) -> Option<&ConfigValue> {
        self.0.as_ref()
    }

    /// Returns true when no variant is set.
    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }
}

impl From<ConfigValue> for ConfigValueWrapper {
    fn from(value: ConfigValue) -> Self {
        Self(Some(value))
    }
}

#[derive(Default, Serialize, Deserialize)]
struct RawWrapper {
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    int_value: Option<i64>,
    #[serde(default)]
    float_value: Option<f64>,
    #[serde(default)]
    bool_value: Option<bool>,
    #[serde(default)]
    list_value: Option<Vec<Value>>,
    #[serde(default)]
    dict_value: Option<Map<String, Value>>,
}

impl Serialize for ConfigValueWrapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut raw = RawWrapper::default();
        match self.0.clone() {
            None => {}
            Some(ConfigValue::String(v)) => raw.string_value = Some(v),
            Some(ConfigValue::Int(v)) => raw.int_value = Some(v),
            Some(ConfigValue::Float(v)) => raw.float_value = Some(v),
            Some(ConfigValue::Bool(v)) => raw.bool_value = Some(v),
            Some(ConfigValue::List(v)) => raw.list_value = Some(v),
            Some(ConfigValue::Dict(v)) => raw.dict_value = Some(v),
        }
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigValueWrapper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawWrapper::deserialize(deserializer)?;
        let mut set = Vec::with_capacity(1);
        if let Some(v) = raw.string_value {
            set.push(ConfigValue::String(v));
        }
        if let Some(v) = raw.int_value {
            set.push(ConfigValue::Int(v));
        }
        if let Some(v) = raw.float_value {
            set.push(ConfigValue::Float(v));
        }
        if let Some(v) = raw.bool_value {
            set.push(ConfigValue::Bool(v));
        }
        if let Some(v) = raw.list_value {
            set.push(ConfigValue::List(v));
        }
        if let Some(v) = raw.dict_value {
            set.push(ConfigValue::Dict(v));
        }

        if set.len() > 1 {
            let fields: Vec<&str> = set.iter().map(ConfigValue::field_name).collect();
            return Err(D::Error::custom(format!(
                "config value wrapper has more than one variant set: {}",
                fields.join(", ")
            )));
        }
        Ok(Self(set.pop()))
    }
}

/// Wrap a plain JSON value into its tagged wrapper.
///
/// Integers that fit in `i64` become `Int`; every other number becomes `Float`.
/// `null` produces the unset wrapper.
pub fn wrap_config_value(value: Value) -> ConfigValueWrapper {
    let wrapped = match value {
        Value::Null => return ConfigValueWrapper::unset(),
        Value::String(s) => ConfigValue::String(s),
        Value::Bool(b) => ConfigValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ConfigValue::Int(i),
            None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Array(items) => ConfigValue::List(items),
        Value::Object(map) => ConfigValue::Dict(map),
    };
    ConfigValueWrapper(Some(wrapped))
}

/// Unwrap a tagged wrapper into a plain JSON value (`null` when unset).
pub fn unwrap_config_value(wrapper: &ConfigValueWrapper) -> Value {
    match &wrapper.0 {
        None => Value::Null,
        Some(ConfigValue::String(s)) => Value::String(s.clone()),
        Some(ConfigValue::Int(i)) => Value::Number((*i).into()),
        Some(ConfigValue::Float(f)) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Some(ConfigValue::Bool(b)) => Value::Bool(*b),
        Some(ConfigValue::List(items)) => Value::Array(items.clone()),
        Some(ConfigValue::Dict(map)) => Value::Object(map.clone()),
    }
}

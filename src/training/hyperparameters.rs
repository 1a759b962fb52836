use std::fmt;
use std::marker::PhantomData;

use anyhow::Result;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::assets::Assets;
use crate::core::settings::PluginConfig;
use crate::error::ParameterError;
use crate::prompt::Prompter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            // Keep a decimal point on whole floats so the training framework
            // still reads them as floats.
            ParamValue::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Named training values in the order they were declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hyperparameters {
    entries: Vec<(String, ParamValue)>,
}

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value of an existing key in place, or appends a new one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(name, value)| {
                let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                (name.to_string(), json)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Hyperparameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Hyperparameters::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

impl Serialize for Hyperparameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Hyperparameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(OrderedVisitor::new("a hyperparameter mapping"))?;
        Ok(Self { entries })
    }
}

/// Optimizer name → default hyperparameters for one model type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDefaults {
    optimizers: Vec<(String, Hyperparameters)>,
}

impl ModelDefaults {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn optimizer_names(&self) -> Vec<String> {
        self.optimizers.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn optimizer(&self, name: &str) -> Option<&Hyperparameters> {
        self.optimizers
            .iter()
            .find(|(optimizer, _)| optimizer == name)
            .map(|(_, params)| params)
    }
}

impl<'de> Deserialize<'de> for ModelDefaults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let optimizers =
            deserializer.deserialize_map(OrderedVisitor::new("optimizer name to hyperparameters"))?;
        Ok(Self { optimizers })
    }
}

struct OrderedVisitor<V> {
    expecting: &'static str,
    marker: PhantomData<V>,
}

impl<V> OrderedVisitor<V> {
    fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            marker: PhantomData,
        }
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.expecting)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(de::Error::custom(format!("duplicate key {key}")));
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    // An empty YAML document parses as unit.
    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    Overrides,
    Interactive,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub optimizer: String,
    pub hyperparameters: Hyperparameters,
    pub source: ConfigSource,
}

/// Picks the optimizer and settles the hyperparameters for `model_type`.
///
/// `use_default_config` wins over explicit `hyperparameters`, which win over
/// asking the user field by field.
pub fn resolve_hyperparameters(
    assets: &Assets,
    model_type: &str,
    config: &PluginConfig,
    prompter: &mut dyn Prompter,
) -> Result<ResolvedConfig> {
    let defaults = assets.load_defaults(model_type)?;

    let optimizer = match config.optimizer.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => prompter.select("Choose optimizer", &defaults.optimizer_names())?,
    };

    let default_config = defaults
        .optimizer(&optimizer)
        .cloned()
        .ok_or_else(|| ParameterError::unsupported_optimizer(&optimizer))?;

    let (hyperparameters, source) = if config.use_default_config {
        (default_config, ConfigSource::Defaults)
    } else if let Some(overrides) = config.hyperparameters.as_ref().filter(|o| !o.is_empty()) {
        (
            apply_overrides(default_config, overrides)?,
            ConfigSource::Overrides,
        )
    } else {
        (
            configuration_prompt(default_config, prompter)?,
            ConfigSource::Interactive,
        )
    };

    info!("Resolved {optimizer} hyperparameters from {source:?}");
    print_config("Using configuration:", &hyperparameters);

    Ok(ResolvedConfig {
        optimizer,
        hyperparameters,
        source,
    })
}

/// Overlays `overrides` onto `current`; every override must name a known field.
pub fn apply_overrides(
    mut current: Hyperparameters,
    overrides: &Hyperparameters,
) -> Result<Hyperparameters, ParameterError> {
    for (key, value) in overrides.iter() {
        if !current.contains(key) {
            return Err(ParameterError::unsupported_hyperparameter(key));
        }
        current.set(key, value.clone());
    }
    Ok(current)
}

fn configuration_prompt(
    mut current: Hyperparameters,
    prompter: &mut dyn Prompter,
) -> Result<Hyperparameters> {
    print_config("Current training configuration:", &current);
    if !prompter.confirm("Edit default configuration?")? {
        return Ok(current);
    }
    let fields: Vec<(String, String)> = current
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for (field, default) in fields {
        if prompter.confirm(&format!("Edit {field}? (default: {default})"))? {
            let answer = prompter.input(&format!("{field}:"), &default)?;
            current.set(field, ParamValue::Text(answer));
        }
    }
    Ok(current)
}

pub fn print_config(message: &str, config: &Hyperparameters) {
    println!("{message}");
    for (field, value) in config.iter() {
        println!("{field}: {value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{Answer, NoPrompt, ScriptedPrompter};

    const DEFAULTS: &str = "\
momentum:
  batch_size: 16
  learning_rate_base: 0.08
  use_dropout: false
adam:
  batch_size: 16
  epsilon: 0.00000001
";

    fn assets() -> Assets {
        Assets::in_memory(&[("ssd_test", DEFAULTS)], &[])
    }

    fn config(optimizer: Option<&str>) -> PluginConfig {
        PluginConfig {
            optimizer: optimizer.map(str::to_string),
            ..PluginConfig::default()
        }
    }

    #[test]
    fn defaults_keep_declaration_order() {
        let defaults = ModelDefaults::from_yaml(DEFAULTS).unwrap();
        assert_eq!(defaults.optimizer_names(), vec!["momentum", "adam"]);
        let keys: Vec<_> = defaults.optimizer("momentum").unwrap().keys().collect();
        assert_eq!(keys, vec!["batch_size", "learning_rate_base", "use_dropout"]);
    }

    #[test]
    fn values_keep_their_scalar_types() {
        let defaults = ModelDefaults::from_yaml(DEFAULTS).unwrap();
        let momentum = defaults.optimizer("momentum").unwrap();
        assert_eq!(momentum.get("batch_size"), Some(&ParamValue::Int(16)));
        assert_eq!(momentum.get("learning_rate_base"), Some(&ParamValue::Float(0.08)));
        assert_eq!(momentum.get("use_dropout"), Some(&ParamValue::Bool(false)));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = ModelDefaults::from_yaml("momentum:\n  a: 1\nmomentum:\n  b: 2\n");
        assert!(err.is_err());
    }

    #[test]
    fn display_formats_values_for_templates() {
        assert_eq!(ParamValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::Float(0.004).to_string(), "0.004");
        assert_eq!(ParamValue::Int(8).to_string(), "8");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
        assert_eq!(ParamValue::from("0.1").to_string(), "0.1");
    }

    #[test]
    fn use_default_config_ignores_overrides() {
        let mut cfg = config(Some("momentum"));
        cfg.use_default_config = true;
        cfg.hyperparameters = Some([("batch_size", 2i64)].into_iter().collect());
        let resolved = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut NoPrompt).unwrap();
        let defaults = ModelDefaults::from_yaml(DEFAULTS).unwrap();
        assert_eq!(&resolved.hyperparameters, defaults.optimizer("momentum").unwrap());
        assert_eq!(resolved.source, ConfigSource::Defaults);
    }

    #[test]
    fn overrides_replace_only_named_fields() {
        let mut cfg = config(Some("momentum"));
        cfg.hyperparameters = Some([("batch_size", 4i64)].into_iter().collect());
        let resolved = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut NoPrompt).unwrap();
        let params = &resolved.hyperparameters;
        assert_eq!(params.get("batch_size"), Some(&ParamValue::Int(4)));
        assert_eq!(params.get("learning_rate_base"), Some(&ParamValue::Float(0.08)));
        assert_eq!(params.get("use_dropout"), Some(&ParamValue::Bool(false)));
        assert_eq!(resolved.source, ConfigSource::Overrides);
    }

    #[test]
    fn unknown_override_names_the_key() {
        let mut cfg = config(Some("adam"));
        cfg.hyperparameters = Some([("momentum_optimizer_value", 0.9f64)].into_iter().collect());
        let err = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut NoPrompt).unwrap_err();
        let param = err.downcast_ref::<ParameterError>().unwrap();
        assert_eq!(param.parameter, "momentum_optimizer_value");
        assert!(param.hint.contains("not supported for this model architecture"));
    }

    #[test]
    fn unknown_optimizer_is_a_parameter_error() {
        let cfg = config(Some("rmsprop"));
        let err = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut NoPrompt).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ParameterError>(),
            Some(&ParameterError::unsupported_optimizer("rmsprop"))
        );
    }

    #[test]
    fn optimizer_is_prompted_when_not_configured() {
        let mut cfg = config(None);
        cfg.use_default_config = true;
        let mut prompter = ScriptedPrompter::new([Answer::Choice("adam".into())]);
        let resolved = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut prompter).unwrap();
        assert_eq!(resolved.optimizer, "adam");
        assert_eq!(prompter.asked(), ["Choose optimizer"]);
    }

    #[test]
    fn interactive_edits_are_stored_as_text() {
        let mut prompter = ScriptedPrompter::new([
            Answer::Confirm(true),
            Answer::Confirm(true),
            Answer::Text("32".into()),
            Answer::Confirm(false),
            Answer::Confirm(false),
        ]);
        let resolved =
            resolve_hyperparameters(&assets(), "ssd_test", &config(Some("momentum")), &mut prompter)
                .unwrap();
        let params = &resolved.hyperparameters;
        assert_eq!(params.get("batch_size"), Some(&ParamValue::Text("32".into())));
        assert_eq!(params.get("learning_rate_base"), Some(&ParamValue::Float(0.08)));
        assert_eq!(resolved.source, ConfigSource::Interactive);
        assert_eq!(prompter.asked()[1], "Edit batch_size? (default: 16)");
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn declining_to_edit_keeps_defaults() {
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);
        let resolved =
            resolve_hyperparameters(&assets(), "ssd_test", &config(Some("adam")), &mut prompter)
                .unwrap();
        assert_eq!(resolved.hyperparameters.get("batch_size"), Some(&ParamValue::Int(16)));
    }

    #[test]
    fn empty_overrides_fall_through_to_prompting() {
        let mut cfg = config(Some("adam"));
        cfg.hyperparameters = Some(Hyperparameters::new());
        let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);
        let resolved = resolve_hyperparameters(&assets(), "ssd_test", &cfg, &mut prompter).unwrap();
        assert_eq!(resolved.source, ConfigSource::Interactive);
    }

    #[test]
    fn metadata_json_keeps_types() {
        let params: Hyperparameters = [("batch_size", ParamValue::Int(8)), ("lr", ParamValue::Float(0.5))]
            .into_iter()
            .collect();
        let json = params.to_json();
        assert_eq!(json["batch_size"], serde_json::json!(8));
        assert_eq!(json["lr"], serde_json::json!(0.5));
    }
}

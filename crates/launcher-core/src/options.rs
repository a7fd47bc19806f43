//! Option schema - how pluggable components declare their settings.
//!
//! Each configurable component (the launcher config, a provider, ...)
//! describes its options as an owned `OptionGroup` tree. Front ends walk that
//! tree to render forms or build argument strings; nothing inspects a parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Key under which untitled groups are gathered by `groups_by_title`.
pub const NO_TITLE: &str = "__NO_TITLE__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Str,
    Int,
    Float,
    Bool,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Str => "str",
            OptionKind::Int => "int",
            OptionKind::Float => "float",
            OptionKind::Bool => "bool",
        }
    }
}

/// One option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Destination name (`max_num_concurrent_units`).
    pub name: String,

    /// Flag spelling (`--max-num-concurrent-units`).
    pub option_string: String,

    pub help: Option<String>,
    pub default: Option<Value>,
    pub kind: OptionKind,
    pub choices: Option<Vec<Value>>,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        let name = name.into();
        let option_string = format!("--{}", name.replace('_', "-"));
        Self {
            name,
            option_string,
            help: None,
            default: None,
            kind,
            choices: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    fn to_argument(&self) -> Value {
        json!({
            "dest": self.name,
            "help": self.help,
            "default": self.default,
            "type": self.kind.as_str(),
            "choices": self.choices,
            "option_string": self.option_string,
        })
    }
}

/// A titled group of options, possibly with nested groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub title: Option<String>,
    pub description: Option<String>,
    pub options: Vec<OptionSpec>,
    pub groups: Vec<OptionGroup>,
}

/// Groups indexed by title.
#[derive(Debug, Default)]
pub struct GroupIndex<'a> {
    pub titled: BTreeMap<&'a str, &'a OptionGroup>,

    /// Groups without a title (reported under `NO_TITLE`).
    pub untitled: Vec<&'a OptionGroup>,
}

impl OptionGroup {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn group(mut self, group: OptionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// This group and every nested group, depth first, skipping groups
    /// that have no description.
    pub fn collect_groups(&self) -> Vec<&OptionGroup> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(group) = stack.pop() {
            out.push(group);
            // reversed so children come out in declaration order
            stack.extend(group.groups.iter().rev());
        }
        out.retain(|g| g.description.is_some());
        out
    }

    /// Described groups keyed by title.
    pub fn groups_by_title(&self) -> GroupIndex<'_> {
        let mut index = GroupIndex::default();
        for group in self.collect_groups() {
            match group.title.as_deref() {
                Some(title) => {
                    index.titled.insert(title, group);
                }
                None => index.untitled.push(group),
            }
        }
        index
    }

    /// Options of this group (not nested ones) keyed by name.
    pub fn arguments(&self) -> Map<String, Value> {
        self.options
            .iter()
            .map(|opt| (opt.name.clone(), opt.to_argument()))
            .collect()
    }

    /// `{ "desc": ..., "args": { name: {...} } }`, or `None` for a group
    /// without a description.
    pub fn to_argument_dict(&self) -> Option<Value> {
        let desc = self.description.as_ref()?;
        Some(json!({
            "desc": desc,
            "args": Value::Object(self.arguments()),
        }))
    }
}

/// Implemented by every component that takes settings.
pub trait DescribeOptions {
    fn describe_options() -> OptionGroup;
}

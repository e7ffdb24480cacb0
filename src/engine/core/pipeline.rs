//! Engine-independent description of a processing graph.
//!
//! A [`PipelineSpec`] is a set of linear [`Chain`]s. Chains meet at named
//! elements through [`Stage::Pad`] references, which is how the demuxer fans
//! out into stream branches and how branches converge on the muxer. The
//! `Display` form is the gst-launch description language.

use super::error::{TranscodeError, TranscodeResult};
use super::passes::ParameterSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub factory: String,
    pub name: Option<String>,
    pub properties: ParameterSet,
}

impl Element {
    pub fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            name: None,
            properties: ParameterSet::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key, value.to_string());
        self
    }

    /// Property whose value is quoted, for paths and free text
    pub fn quoted_property(self, key: impl Into<String>, value: &str) -> Self {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        self.property(key, format!("\"{}\"", escaped))
    }

    /// Merge an encoder pass parameter set into the properties
    pub fn with_parameters(mut self, params: &ParameterSet) -> Self {
        for (key, value) in params.iter() {
            self.properties.insert(key, value);
        }
        self
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.factory)?;
        if let Some(name) = &self.name {
            write!(f, " name={}", name)?;
        }
        if !self.properties.is_empty() {
            write!(f, " {}", self.properties)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Element(Element),
    /// Caps filter, e.g. `video/x-raw,width=1280,height=534`
    Caps(String),
    /// Verbatim description supplied by a preset (codec transforms)
    Fragment(String),
    /// Reference to a named element, optionally to one of its request pads
    Pad { element: String, pad: Option<String> },
}

impl Stage {
    pub fn pad(element: impl Into<String>) -> Self {
        Self::Pad {
            element: element.into(),
            pad: None,
        }
    }

    pub fn request_pad(element: impl Into<String>, pad: impl Into<String>) -> Self {
        Self::Pad {
            element: element.into(),
            pad: Some(pad.into()),
        }
    }
}

impl From<Element> for Stage {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => element.fmt(f),
            Self::Caps(caps) => f.write_str(caps),
            Self::Fragment(fragment) => f.write_str(fragment.trim()),
            Self::Pad { element, pad } => write!(f, "{}.{}", element, pad.as_deref().unwrap_or("")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    pub stages: Vec<Stage>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    pub fn push(&mut self, stage: impl Into<Stage>) {
        self.stages.push(stage.into());
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" ! ")?;
            }
            stage.fmt(f)?;
        }
        Ok(())
    }
}

/// Complete description for one pass, built fresh and never mutated once launched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSpec {
    pub chains: Vec<Chain>,
}

impl PipelineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&mut self, chain: Chain) {
        if !chain.stages.is_empty() {
            self.chains.push(chain);
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.chains.iter().flat_map(|c| &c.stages).filter_map(|s| match s {
            Stage::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Look up an element by its `name=` property
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name.as_deref() == Some(name))
    }

    pub fn has_factory(&self, factory: &str) -> bool {
        self.elements().any(|e| e.factory == factory)
    }

    /// Split the description into launcher arguments, one token per argument
    pub fn to_args(&self) -> TranscodeResult<Vec<String>> {
        let description = self.to_string();
        shlex::split(&description).ok_or_else(|| {
            TranscodeError::construction(format!("unbalanced quoting in '{}'", description))
        })
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            chain.fmt(f)?;
        }
        Ok(())
    }
}

//! Reading and writing net documents as RON or JSON

use crate::error::{Error, Result};
use crate::schema::NetDocument;
use petriflow_engine::Controller;
use ron::ser::PrettyConfig;
use std::fs;
use std::path::Path;

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Json,
}

impl Format {
    /// Pick the format from a file extension (`.ron` or `.json`)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(Format::Ron),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl NetDocument {
    /// Parse a RON document
    pub fn from_ron_str(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a document in the given format
    pub fn parse(content: &str, format: Format) -> Result<Self> {
        match format {
            Format::Ron => Self::from_ron_str(content),
            Format::Json => Self::from_json_str(content),
        }
    }

    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = PrettyConfig::new().struct_names(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the document in the given format
    pub fn render(&self, format: Format) -> Result<String> {
        match format {
            Format::Ron => self.to_ron_string(),
            Format::Json => self.to_json_string(),
        }
    }

    /// Load a document, choosing the format from the file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let content = fs::read_to_string(path)?;
        let document = Self::parse(&content, format)?;
        tracing::info!(
            path = %path.display(),
            ?format,
            places = document.places.len(),
            transitions = document.transitions.len(),
            arcs = document.arcs.len(),
            "loaded net document"
        );
        Ok(document)
    }

    /// Save a document, choosing the format from the file extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        fs::write(path, self.render(format)?)?;
        tracing::info!(path = %path.display(), ?format, "saved net document");
        Ok(())
    }

    /// Build a controller for the net using the document's simulation settings
    pub fn into_controller(self) -> Result<Controller> {
        let config = self.config();
        let net = self.into_net()?;
        Ok(Controller::new(net, config)?)
    }
}

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyGroup {
    Dependencies,
    DevDependencies,
}

impl DependencyGroup {
    pub const ALL: [DependencyGroup; 2] = [
        DependencyGroup::Dependencies,
        DependencyGroup::DevDependencies,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DependencyGroup::Dependencies => "dependencies",
            DependencyGroup::DevDependencies => "devDependencies",
        }
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One dependency entry as it was before a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub group: DependencyGroup,
    pub original: String,
}

/// Reversible record of a [`Manifest::pin_local_directory`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEdit {
    pub package: String,
    pub entries: Vec<ManifestEntry>,
}

/// The project's `package.json`, read and written per operation.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

/// Layout details kept across a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    indent: String,
    crlf: bool,
    trailing_newline: bool,
}

impl Layout {
    fn detect(content: &str) -> Self {
        let indent = content
            .lines()
            .skip(1)
            .find_map(|line| {
                let trimmed = line.trim_start_matches([' ', '\t']);
                let width = line.len() - trimmed.len();
                (width > 0 && !trimmed.is_empty()).then(|| line[..width].to_string())
            })
            .unwrap_or_else(|| "  ".to_string());

        Self {
            indent,
            crlf: content.contains("\r\n"),
            trailing_newline: content.ends_with('\n'),
        }
    }

    fn render(&self, document: &Value) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut serializer)?;

        let mut rendered = String::from_utf8_lossy(&buf).into_owned();
        if self.crlf {
            rendered = rendered.replace('\n', "\r\n");
        }
        if self.trailing_newline {
            rendered.push_str(if self.crlf { "\r\n" } else { "\n" });
        }
        Ok(rendered)
    }
}

impl Manifest {
    pub fn new(project_root: &Path) -> Self {
        Self {
            path: project_root.join(MANIFEST_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The declared range of `name`, looking in `dependencies` first.
    pub fn declared_range(&self, name: &str) -> Result<Option<(DependencyGroup, String)>> {
        let (document, _) = self.read()?;
        Ok(DependencyGroup::ALL.into_iter().find_map(|group| {
            Self::entry(&document, group, name).map(|value| (group, value.to_string()))
        }))
    }

    /// Repoints `name` at `file:<dir>` in every group that declares it.
    pub fn pin_local_directory(&self, name: &str, dir: &str) -> Result<ManifestEdit> {
        let (mut document, layout) = self.read()?;

        let entries: Vec<ManifestEntry> = DependencyGroup::ALL
            .into_iter()
            .filter_map(|group| {
                Self::entry(&document, group, name).map(|value| ManifestEntry {
                    group,
                    original: value.to_string(),
                })
            })
            .collect();

        if entries.is_empty() {
            return Err(Error::DependencyNotDeclared(name.to_string()));
        }

        let link = format!("file:{dir}");
        for entry in &entries {
            Self::set_entry(&mut document, entry.group, name, &link)?;
        }
        self.write(&document, &layout)?;

        info!("Pinned {} to {} in {:?}", name, link, self.path);
        Ok(ManifestEdit {
            package: name.to_string(),
            entries,
        })
    }

    /// Restores the values captured by `edit`. Calling it again is a no-op.
    pub fn revert(&self, edit: &ManifestEdit) -> Result<()> {
        let (mut document, layout) = self.read()?;
        for entry in &edit.entries {
            Self::set_entry(&mut document, entry.group, &edit.package, &entry.original)?;
        }
        self.write(&document, &layout)?;

        info!("Reverted {} in {:?}", edit.package, self.path);
        Ok(())
    }

    fn read(&self) -> Result<(Value, Layout)> {
        let content = std::fs::read_to_string(&self.path)?;
        let document: Value = serde_json::from_str(&content)?;
        Ok((document, Layout::detect(&content)))
    }

    fn write(&self, document: &Value, layout: &Layout) -> Result<()> {
        let rendered = layout.render(document)?;
        std::fs::write(&self.path, rendered)?;
        debug!("Wrote {:?}", self.path);
        Ok(())
    }

    fn entry<'a>(document: &'a Value, group: DependencyGroup, name: &str) -> Option<&'a str> {
        document
            .get(group.key())?
            .get(name)?
            .as_str()
            .filter(|value| !value.is_empty())
    }

    fn set_entry(document: &mut Value, group: DependencyGroup, name: &str, value: &str) -> Result<()> {
        let root = document.as_object_mut().ok_or_else(|| {
            Error::InvalidManifest("top level must be a JSON object".to_string())
        })?;
        let section = root
            .entry(group.key())
            .or_insert_with(|| Value::Object(Map::new()));
        let section = section.as_object_mut().ok_or_else(|| {
            Error::InvalidManifest(format!("`{}` is not an object", group.key()))
        })?;
        section.insert(name.to_string(), Value::String(value.to_string()));
        Ok(())
    }
}

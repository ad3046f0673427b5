use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Maps a residue name to the template file that describes it.
pub type TemplateLocator = Box<dyn Fn(&str) -> Option<PathBuf>>;

pub type SharedTemplateCache = Rc<RefCell<TemplateCache>>;

thread_local! {
    static TEMPLATE_CACHE: RefCell<SharedTemplateCache> =
        RefCell::new(Rc::new(RefCell::new(TemplateCache::new())));
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("No template for residue '{residue}' (looked for '{path}')")]
    NoTemplate { residue: String, path: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Template syntax error in '{path}': {source}")]
    TemplateSyntax {
        path: String,
        source: toml::de::Error,
    },

    #[error("Malformed condition for atom '{atom}' in '{path}': {reason}")]
    MalformedCondition {
        path: String,
        atom: String,
        reason: &'static str,
    },
}

impl TemplateError {
    /// Whether the template file exists but could not be understood.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            TemplateError::TemplateSyntax { .. } | TemplateError::MalformedCondition { .. }
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplate {
    #[serde(default)]
    atoms: HashMap<String, RawAtom>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAtom {
    #[serde(rename = "type")]
    normal_type: String,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    op: String,
    operand: String,
    result: String,
}

/// One conditional rule: when `op` applied to `operand` holds, the atom gets `result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub op: char,
    pub operand: String,
    pub result: String,
}

/// Atom-type rules for one atom name. A type of `-` means "assign nothing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomTemplate {
    pub normal_type: String,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResidueTemplate {
    atoms: HashMap<String, AtomTemplate>,
}

impl ResidueTemplate {
    pub fn atom(&self, name: &str) -> Option<&AtomTemplate> {
        self.atoms.get(name)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn parse(content: &str, path: &str) -> Result<Self, TemplateError> {
        let raw: RawTemplate =
            toml::from_str(content).map_err(|e| TemplateError::TemplateSyntax {
                path: path.to_string(),
                source: e,
            })?;

        let mut atoms = HashMap::with_capacity(raw.atoms.len());
        for (name, raw_atom) in raw.atoms {
            let malformed = |reason| TemplateError::MalformedCondition {
                path: path.to_string(),
                atom: name.clone(),
                reason,
            };
            if raw_atom.normal_type.is_empty() {
                return Err(malformed("empty type"));
            }
            let conditions = raw_atom
                .conditions
                .into_iter()
                .map(|c| {
                    let mut chars = c.op.chars();
                    let op = match (chars.next(), chars.next()) {
                        (Some(op), None) => op,
                        _ => return Err(malformed("operator must be a single character")),
                    };
                    if c.operand.is_empty() {
                        return Err(malformed("empty operand"));
                    }
                    if c.result.is_empty() {
                        return Err(malformed("empty result"));
                    }
                    Ok(Condition {
                        op,
                        operand: c.operand,
                        result: c.result,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            atoms.insert(
                name,
                AtomTemplate {
                    normal_type: raw_atom.normal_type,
                    conditions,
                },
            );
        }
        Ok(Self { atoms })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    residue: String,
    app: String,
    template_dir: String,
    extension: String,
}

/// Memoized loader of residue templates.
///
/// Templates are read from `<bundle_dir>/<app>/<template_dir>/<RESIDUE>.<extension>` unless a
/// locator is installed and knows the residue. One cache is shared per host thread (see
/// [`TemplateCache::shared`]); tests install their own.
pub struct TemplateCache {
    bundle_dir: PathBuf,
    locator: Option<TemplateLocator>,
    templates: HashMap<TemplateKey, Rc<ResidueTemplate>>,
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("bundle_dir", &self.bundle_dir)
            .field("has_locator", &self.locator.is_some())
            .field("cached", &self.templates.len())
            .finish()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCache {
    pub fn new() -> Self {
        Self {
            bundle_dir: PathBuf::from("."),
            locator: None,
            templates: HashMap::new(),
        }
    }

    pub fn shared() -> SharedTemplateCache {
        TEMPLATE_CACHE.with(|c| c.borrow().clone())
    }

    /// Replaces the thread's cache, returning the previous one.
    pub fn install(cache: SharedTemplateCache) -> SharedTemplateCache {
        TEMPLATE_CACHE.with(|c| c.replace(cache))
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Changes the template root. Previously loaded templates are forgotten.
    pub fn set_bundle_dir(&mut self, dir: impl Into<PathBuf>) {
        self.bundle_dir = dir.into();
        self.templates.clear();
    }

    pub fn set_locator(&mut self, locator: Option<TemplateLocator>) {
        self.locator = locator;
        self.templates.clear();
    }

    pub fn num_cached(&self) -> usize {
        self.templates.len()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    fn template_path(&self, key: &TemplateKey) -> PathBuf {
        if let Some(path) = self.locator.as_ref().and_then(|l| l(&key.residue)) {
            return path;
        }
        self.bundle_dir
            .join(&key.app)
            .join(&key.template_dir)
            .join(format!("{}.{}", key.residue, key.extension))
    }

    #[instrument(skip(self), level = "debug")]
    pub fn res_template(
        &mut self,
        residue: &str,
        app: &str,
        template_dir: &str,
        extension: &str,
    ) -> Result<Rc<ResidueTemplate>, TemplateError> {
        let key = TemplateKey {
            residue: residue.to_string(),
            app: app.to_string(),
            template_dir: template_dir.to_string(),
            extension: extension.to_string(),
        };
        if let Some(template) = self.templates.get(&key) {
            return Ok(Rc::clone(template));
        }

        let path = self.template_path(&key);
        if !path.is_file() {
            return Err(TemplateError::NoTemplate {
                residue: residue.to_string(),
                path: path.to_string_lossy().to_string(),
            });
        }
        let template = Rc::new(ResidueTemplate::load(&path)?);
        debug!(path = %path.display(), atoms = template.len(), "Loaded residue template");
        self.templates.insert(key, Rc::clone(&template));
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ALA: &str = r#"
[atoms.N]
type = "N3"

[atoms.OXT]
type = "O"
conditions = [{ op = "?", operand = "OXT", result = "O-minus" }]

[atoms.H]
type = "-"
"#;

    fn bundle_with(name: &str, content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let tmpl_dir = dir.path().join("idatm").join("templates");
        fs::create_dir_all(&tmpl_dir).unwrap();
        fs::write(tmpl_dir.join(format!("{name}.tmpl")), content).unwrap();
        dir
    }

    #[test]
    fn parse_reads_types_and_conditions() {
        let template = ResidueTemplate::parse(ALA, "ALA.tmpl").unwrap();
        assert_eq!(template.len(), 3);
        assert_eq!(template.atom("N").unwrap().normal_type, "N3");
        let oxt = template.atom("OXT").unwrap();
        assert_eq!(oxt.normal_type, "O");
        assert_eq!(
            oxt.conditions,
            [Condition {
                op: '?',
                operand: "OXT".into(),
                result: "O-minus".into()
            }]
        );
        assert!(template.atom("CB").is_none());
    }

    #[test]
    fn parse_rejects_bad_toml_and_unknown_fields() {
        let err = ResidueTemplate::parse("[atoms.N\n", "bad").unwrap_err();
        assert!(matches!(err, TemplateError::TemplateSyntax { .. }));
        let err = ResidueTemplate::parse("[atoms.N]\ntype = \"N\"\ncharge = 1\n", "bad").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn parse_rejects_malformed_conditions() {
        let two_char_op = r#"[atoms.O]
type = "O"
conditions = [{ op = "??", operand = "OXT", result = "O2" }]
"#;
        let err = ResidueTemplate::parse(two_char_op, "bad").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MalformedCondition { ref atom, .. } if atom == "O"
        ));

        let empty_result = r#"[atoms.O]
type = "O"
conditions = [{ op = ".", operand = "OXT", result = "" }]
"#;
        assert!(ResidueTemplate::parse(empty_result, "bad").unwrap_err().is_syntax());
    }

    #[test]
    fn unknown_single_character_operators_load() {
        let content = r#"[atoms.O]
type = "O"
conditions = [{ op = "!", operand = "OXT", result = "O2" }]
"#;
        let template = ResidueTemplate::parse(content, "x").unwrap();
        assert_eq!(template.atom("O").unwrap().conditions[0].op, '!');
    }

    #[test]
    fn cache_loads_from_bundle_dir_and_memoizes() {
        let dir = bundle_with("ALA", ALA);
        let mut cache = TemplateCache::new();
        cache.set_bundle_dir(dir.path());

        let first = cache.res_template("ALA", "idatm", "templates", "tmpl").unwrap();
        let second = cache.res_template("ALA", "idatm", "templates", "tmpl").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.num_cached(), 1);

        cache.set_bundle_dir(dir.path());
        assert_eq!(cache.num_cached(), 0);
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = bundle_with("ALA", ALA);
        let mut cache = TemplateCache::new();
        cache.set_bundle_dir(dir.path());
        let err = cache.res_template("GLY", "idatm", "templates", "tmpl").unwrap_err();
        assert!(matches!(err, TemplateError::NoTemplate { ref residue, .. } if residue == "GLY"));
    }

    #[test]
    fn locator_takes_precedence_over_bundle_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[atoms.ZN]\ntype = \"Zn2+\"\n").unwrap();

        let mut cache = TemplateCache::new();
        cache.set_locator(Some(Box::new(move |name: &str| {
            (name == "ZN").then(|| path.clone())
        })));
        let template = cache.res_template("ZN", "idatm", "templates", "tmpl").unwrap();
        assert_eq!(template.atom("ZN").unwrap().normal_type, "Zn2+");
        assert!(cache.res_template("CU", "idatm", "templates", "tmpl").is_err());
    }

    #[test]
    fn installing_a_cache_replaces_the_thread_default() {
        let fresh = Rc::new(RefCell::new(TemplateCache::new()));
        let previous = TemplateCache::install(fresh.clone());
        assert!(Rc::ptr_eq(&TemplateCache::shared(), &fresh));
        TemplateCache::install(previous);
    }
}

use super::AtomicStructure;
use crate::core::config::TemplateConfig;
use crate::core::error::StructureError;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, ResidueId};
use crate::core::models::residue::Residue;
use crate::core::topology::{AtomTemplate, SharedTemplateCache, TemplateCache};
use crate::core::tracking::ChangeReason;
use tracing::{debug, instrument};

/// Template result meaning "leave this atom alone".
const NO_ASSIGNMENT: &str = "-";

impl AtomicStructure {
    /// Assigns atom types to a residue from its template in the thread's shared cache.
    ///
    /// `assign` is called once per assigned atom with the chosen type; the assigned atoms are
    /// returned in residue order.
    pub fn template_assign(
        &mut self,
        residue: ResidueId,
        assign: impl FnMut(&mut Atom, &str),
        app: &str,
        template_dir: &str,
        extension: &str,
    ) -> Result<Vec<AtomId>, StructureError> {
        let cache = TemplateCache::shared();
        self.template_assign_with(&cache, residue, assign, app, template_dir, extension)
    }

    /// Like [`AtomicStructure::template_assign`], with the template location taken from a
    /// [`TemplateConfig`].
    pub fn template_assign_configured(
        &mut self,
        residue: ResidueId,
        assign: impl FnMut(&mut Atom, &str),
        config: &TemplateConfig,
    ) -> Result<Vec<AtomId>, StructureError> {
        let cache = TemplateCache::shared();
        config.apply(&mut cache.borrow_mut());
        self.template_assign_with(
            &cache,
            residue,
            assign,
            &config.app,
            &config.template_dir,
            &config.extension,
        )
    }

    #[instrument(skip(self, cache, assign), level = "debug")]
    pub fn template_assign_with(
        &mut self,
        cache: &SharedTemplateCache,
        residue: ResidueId,
        mut assign: impl FnMut(&mut Atom, &str),
        app: &str,
        template_dir: &str,
        extension: &str,
    ) -> Result<Vec<AtomId>, StructureError> {
        let r = self.residue_checked(residue)?;
        let template = cache
            .borrow_mut()
            .res_template(r.name(), app, template_dir, extension)?;

        let mut decisions: Vec<(AtomId, String)> = Vec::new();
        for &aid in r.atoms() {
            let atom = self.atom_checked(aid)?;
            let Some(rules) = template.atom(atom.name()) else {
                continue;
            };
            let chosen = self.choose_type(r, residue, rules)?;
            if chosen != NO_ASSIGNMENT {
                decisions.push((aid, chosen.to_string()));
            }
        }

        let mut assigned = Vec::with_capacity(decisions.len());
        for (aid, atom_type) in decisions {
            if let Some(atom) = self.graph.vertex_mut(aid) {
                assign(atom, &atom_type);
                self.track_modified(self.atom_key(aid), ChangeReason::AtomType);
                assigned.push(aid);
            }
        }
        debug!(assigned = assigned.len(), "Template assignment done");
        Ok(assigned)
    }

    /// Evaluates an atom's conditions in order; the first that holds picks the type.
    fn choose_type<'t>(
        &self,
        r: &Residue,
        residue: ResidueId,
        rules: &'t AtomTemplate,
    ) -> Result<&'t str, StructureError> {
        for condition in &rules.conditions {
            let holds = match condition.op {
                '?' => r.find_atom(&condition.operand).is_some(),
                '.' => r.find_atom(&condition.operand).is_some_and(|a| {
                    self.neighbors(a)
                        .iter()
                        .all(|&n| self.atom(n).is_some_and(|n| n.residue() == Some(residue)))
                }),
                op => {
                    return Err(StructureError::InternalLogic(format!(
                        "template condition operator '{op}' is not implemented"
                    )));
                }
            };
            if holds {
                return Ok(condition.result.as_str());
            }
        }
        Ok(rules.normal_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::core::config::TemplateConfigBuilder;
    use crate::core::models::element::Element;
    use crate::core::topology::TemplateError;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    const ALA_TEMPLATE: &str = r#"
[atoms.N]
type = "N3"

[atoms.CA]
type = "C3"

[atoms.C]
type = "C2"
conditions = [{ op = ".", operand = "C", result = "Cac" }]

[atoms.OXT]
type = "O"
conditions = [{ op = "?", operand = "OXT", result = "O-minus" }]

[atoms.H]
type = "-"
"#;

    fn write_template(root: &Path, name: &str, content: &str) {
        let dir = root.join("idatm").join("templates");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.tmpl")), content).unwrap();
    }

    fn cache_at(root: &Path) -> SharedTemplateCache {
        let cache = Rc::new(RefCell::new(TemplateCache::new()));
        cache.borrow_mut().set_bundle_dir(root);
        cache
    }

    fn record_types(calls: &mut Vec<(String, String)>) -> impl FnMut(&mut Atom, &str) + '_ {
        move |atom: &mut Atom, atom_type: &str| {
            calls.push((atom.name().to_string(), atom_type.to_string()));
            atom.set_computed_type(atom_type);
        }
    }

    #[test]
    fn present_atom_takes_the_conditional_type() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "ALA", ALA_TEMPLATE);
        let cache = cache_at(dir.path());

        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(
            &mut s,
            "ALA",
            "A",
            1,
            &[
                ("N", Element::N),
                ("CA", Element::C),
                ("OXT", Element::O),
                ("H", Element::H),
                ("CB", Element::C),
            ],
        );

        let mut calls = Vec::new();
        let assigned = s
            .template_assign_with(&cache, rid, record_types(&mut calls), "idatm", "templates", "tmpl")
            .unwrap();

        assert_eq!(assigned, atoms[..3]);
        assert!(calls.contains(&("OXT".to_string(), "O-minus".to_string())));
        assert!(!calls.iter().any(|(name, _)| name == "H" || name == "CB"));
        assert_eq!(s.atom(atoms[0]).unwrap().computed_type(), Some("N3"));
    }

    #[test]
    fn absent_operand_falls_back_to_nothing_for_missing_atoms() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "ALA", ALA_TEMPLATE);
        let cache = cache_at(dir.path());

        let mut s = isolated_structure();
        let (rid, _) = add_residue(&mut s, "ALA", "A", 1, &[("N", Element::N), ("CA", Element::C)]);

        let mut calls = Vec::new();
        s.template_assign_with(&cache, rid, record_types(&mut calls), "idatm", "templates", "tmpl")
            .unwrap();
        assert!(calls.iter().all(|(_, t)| t != "O-minus" && t != "O"));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn terminal_condition_requires_all_neighbors_inside_the_residue() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "ALA", ALA_TEMPLATE);
        let cache = cache_at(dir.path());

        let mut s = isolated_structure();
        let (r1, a) = add_residue(&mut s, "ALA", "A", 1, &[("CA", Element::C), ("C", Element::C)]);
        let (r2, b) = add_residue(&mut s, "ALA", "A", 2, &[("N", Element::N), ("C", Element::C)]);
        s.bond_atoms(a[0], a[1]).unwrap();
        s.bond_atoms(a[1], b[0]).unwrap();

        let mut calls = Vec::new();
        s.template_assign_with(&cache, r1, record_types(&mut calls), "idatm", "templates", "tmpl")
            .unwrap();
        assert!(calls.contains(&("C".to_string(), "C2".to_string())));

        calls.clear();
        s.template_assign_with(&cache, r2, record_types(&mut calls), "idatm", "templates", "tmpl")
            .unwrap();
        assert!(calls.contains(&("C".to_string(), "Cac".to_string())));
    }

    #[test]
    fn assignments_are_tracked_as_atom_type_changes() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "ALA", ALA_TEMPLATE);
        let cache = cache_at(dir.path());
        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(&mut s, "ALA", "A", 1, &[("N", Element::N)]);
        s.change_tracker().borrow_mut().clear();

        s.template_assign_with(&cache, rid, |_, _| {}, "idatm", "templates", "tmpl")
            .unwrap();
        let t = s.change_tracker().borrow();
        let key = s.atom_key(atoms[0]);
        assert!(t
            .changes()
            .category(crate::core::tracking::Category::Atom)
            .reasons_for(&key)
            .unwrap()
            .contains(&ChangeReason::AtomType));
    }

    #[test]
    fn unknown_operator_is_an_internal_logic_error() {
        let dir = TempDir::new().unwrap();
        write_template(
            dir.path(),
            "SER",
            r#"
[atoms.OG]
type = "O3"
conditions = [{ op = "!", operand = "HG", result = "O3-" }]
"#,
        );
        let cache = cache_at(dir.path());
        let mut s = isolated_structure();
        let (rid, _) = add_residue(&mut s, "SER", "A", 1, &[("OG", Element::O)]);

        let err = s
            .template_assign_with(&cache, rid, |_, _| {}, "idatm", "templates", "tmpl")
            .unwrap_err();
        assert!(matches!(err, StructureError::InternalLogic(_)));
    }

    #[test]
    fn missing_and_broken_templates_surface_as_errors() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "BAD", "[atoms.X]\ntype = 3\n");
        let cache = cache_at(dir.path());
        let mut s = isolated_structure();
        let (unknown, _) = add_residue(&mut s, "UNL", "A", 1, &[("C1", Element::C)]);
        let (bad, _) = add_residue(&mut s, "BAD", "A", 2, &[("X", Element::C)]);

        let err = s
            .template_assign_with(&cache, unknown, |_, _| {}, "idatm", "templates", "tmpl")
            .unwrap_err();
        assert!(matches!(
            err,
            StructureError::Template {
                source: TemplateError::NoTemplate { .. }
            }
        ));

        let err = s
            .template_assign_with(&cache, bad, |_, _| {}, "idatm", "templates", "tmpl")
            .unwrap_err();
        assert!(matches!(err, StructureError::Template { ref source } if source.is_syntax()));
    }

    #[test]
    fn configured_assignment_uses_the_shared_cache() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "ALA", ALA_TEMPLATE);
        let previous = TemplateCache::install(Rc::new(RefCell::new(TemplateCache::new())));
        let config = TemplateConfigBuilder::new()
            .bundle_dir(dir.path())
            .app("idatm")
            .template_dir("templates")
            .extension("tmpl")
            .build()
            .unwrap();

        let mut s = isolated_structure();
        let (rid, atoms) = add_residue(&mut s, "ALA", "A", 1, &[("CA", Element::C)]);
        let assigned = s
            .template_assign_configured(rid, |a, t| a.set_computed_type(t), &config)
            .unwrap();
        assert_eq!(assigned, atoms);
        assert_eq!(TemplateCache::shared().borrow().num_cached(), 1);
        TemplateCache::install(previous);
    }
}

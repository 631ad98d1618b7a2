//! Human-readable reports for dead-end resolver states.

use std::fmt;

use crate::index::{CatalogIndex, ConstraintId, UnitId, UnitVersionId};

/// Why a unit could not be assigned: the constraints recorded against it and
/// who introduced each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub unit: String,
    /// The version whose choice failed, if the conflict came from a choice.
    pub chosen: Option<String>,
    pub lines: Vec<ConflictLine>,
}

/// One constraint on the conflicting unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictLine {
    pub constraint: String,
    /// `unit@version` that introduced the constraint; `None` for top-level
    /// constraints.
    pub required_by: Option<String>,
}

impl ConflictReport {
    pub fn new(unit: impl Into<String>, chosen: Option<String>) -> Self {
        Self {
            unit: unit.into(),
            chosen,
            lines: Vec::new(),
        }
    }

    /// Build a report for `unit` from the constraints recorded against it.
    pub fn for_unit<I>(
        index: &CatalogIndex,
        unit: UnitId,
        chosen: Option<UnitVersionId>,
        constraints: I,
    ) -> Self
    where
        I: IntoIterator<Item = (ConstraintId, Option<UnitVersionId>)>,
    {
        let chosen = chosen.map(|uv| index.unit_version(uv).version.to_string());
        let mut report = Self::new(index.unit_name(unit), chosen);
        for (constraint, origin) in constraints {
            report.add(ConflictLine {
                constraint: index.constraint(constraint).to_string(),
                required_by: origin.map(|uv| index.unit_version(uv).to_string()),
            });
        }
        report
    }

    /// Add a line unless an identical one is already present.
    pub fn add(&mut self, line: ConflictLine) {
        if !self.lines.contains(&line) {
            self.lines.push(line);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chosen {
            Some(version) => write!(
                f,
                "{}@{} does not satisfy all constraints on {}",
                self.unit, version, self.unit
            )?,
            None => write!(f, "No version of {} satisfies all constraints", self.unit)?,
        }
        for line in &self.lines {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ConflictLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.required_by {
            Some(origin) => write!(f, "{} <- {}", self.constraint, origin),
            None => write!(f, "{} <- top level", self.constraint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ConflictReport::new("jquery", None);
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "No version of jquery satisfies all constraints");
    }

    #[test]
    fn report_with_origins() {
        let mut report = ConflictReport::new("sparkle", Some("1.0.0".to_string()));
        report.add(ConflictLine {
            constraint: "sparkle@=1.0.0".to_string(),
            required_by: None,
        });
        report.add(ConflictLine {
            constraint: "sparkle@2.1.1".to_string(),
            required_by: Some("jquery-widgets@1.0.0".to_string()),
        });
        assert_eq!(report.len(), 2);
        let s = report.to_string();
        assert!(s.starts_with("sparkle@1.0.0 does not satisfy"));
        assert!(s.contains("sparkle@=1.0.0 <- top level"));
        assert!(s.contains("sparkle@2.1.1 <- jquery-widgets@1.0.0"));
    }

    #[test]
    fn duplicate_lines_are_dropped() {
        let mut report = ConflictReport::new("forms", None);
        let line = ConflictLine {
            constraint: "forms@1.0.0".to_string(),
            required_by: Some("app@1.0.0".to_string()),
        };
        report.add(line.clone());
        report.add(line);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn built_from_index() {
        let mut index = CatalogIndex::new();
        let app = index.add_unit_version("app", "1.0.0", "1.0.0").unwrap();
        index.add_unit_version("lib", "2.0.0", "2.0.0").unwrap();
        let c = index.get_constraint("lib", "1.0.0").unwrap().unwrap();
        let unit = index.unit_id("lib").unwrap();

        let report = ConflictReport::for_unit(&index, unit, None, [(c, Some(app)), (c, None)]);
        assert_eq!(report.len(), 2);
        assert!(report.to_string().contains("lib@1.0.0 <- app@1.0.0"));
    }
}

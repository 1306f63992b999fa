// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Two-phase skill catalogue.
//!
//! Phase 1: every advertised skill contributes a `name: description` line to
//! the system prompt so the model knows what exists.  Phase 2: the full
//! instruction body of each *active* skill is additionally injected, in
//! activation order.  There is no cache to invalidate — the agent re-renders
//! the system prompt on every turn.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SkillError {
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Hidden skills are omitted from the Phase 1 catalogue but can still be
    /// activated programmatically.
    pub hidden: bool,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: Vec<Skill>,
    /// Names of active skills, in activation order.  Phase 2 injection
    /// follows this order.
    active: Vec<String>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, skill: Skill) {
        self.skills.push(skill);
    }

    pub fn activate(&mut self, name: &str) -> Result<(), SkillError> {
        if !self.skills.iter().any(|s| s.name == name) {
            return Err(SkillError::UnknownSkill(name.to_string()));
        }
        if !self.active.iter().any(|n| n == name) {
            self.active.push(name.to_string());
        }
        Ok(())
    }

    pub fn deactivate(&mut self, name: &str) {
        self.active.retain(|n| n != name);
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Phase 1 catalogue: one `name: description` line per advertised skill.
    /// `None` when nothing is advertised.
    pub fn catalog(&self) -> Option<String> {
        let lines: Vec<String> = self
            .skills
            .iter()
            .filter(|s| !s.hidden)
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// Phase 2 injection: full instruction bodies of active skills, in
    /// activation order.
    pub fn active_instructions(&self) -> Option<String> {
        let sections: Vec<String> = self
            .active
            .iter()
            .filter_map(|name| self.skills.iter().find(|s| &s.name == name))
            .map(|s| format!("## Skill: {}\n{}", s.name, s.instructions))
            .collect();
        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SkillRegistry {
        let mut reg = SkillRegistry::new();
        reg.add(Skill::new("git", "version control workflows", "Use git like so."));
        reg.add(Skill::new("sql", "database queries", "Write safe SQL."));
        reg.add(Skill::new("ops", "internal runbooks", "Secret runbook.").hidden());
        reg
    }

    #[test]
    fn catalog_lists_advertised_skills_only() {
        let reg = registry();
        let catalog = reg.catalog().unwrap();
        assert!(catalog.contains("git: version control workflows"));
        assert!(catalog.contains("sql: database queries"));
        assert!(!catalog.contains("ops"));
    }

    #[test]
    fn empty_registry_has_no_catalog() {
        assert!(SkillRegistry::new().catalog().is_none());
    }

    #[test]
    fn instructions_appear_only_after_activation() {
        let mut reg = registry();
        assert!(reg.active_instructions().is_none());
        reg.activate("git").unwrap();
        let inject = reg.active_instructions().unwrap();
        assert!(inject.contains("Use git like so."));
        assert!(!inject.contains("Write safe SQL."));
    }

    #[test]
    fn activation_order_is_injection_order() {
        let mut reg = registry();
        reg.activate("sql").unwrap();
        reg.activate("git").unwrap();
        let inject = reg.active_instructions().unwrap();
        let sql_pos = inject.find("Skill: sql").unwrap();
        let git_pos = inject.find("Skill: git").unwrap();
        assert!(sql_pos < git_pos, "first activated must be injected first");
    }

    #[test]
    fn activate_is_idempotent() {
        let mut reg = registry();
        reg.activate("git").unwrap();
        reg.activate("git").unwrap();
        let inject = reg.active_instructions().unwrap();
        assert_eq!(inject.matches("Skill: git").count(), 1);
    }

    #[test]
    fn deactivate_removes_injection() {
        let mut reg = registry();
        reg.activate("git").unwrap();
        reg.deactivate("git");
        assert!(reg.active_instructions().is_none());
        assert!(!reg.is_active("git"));
    }

    #[test]
    fn unknown_skill_cannot_be_activated() {
        let mut reg = registry();
        assert_eq!(
            reg.activate("nope"),
            Err(SkillError::UnknownSkill("nope".into()))
        );
    }

    #[test]
    fn hidden_skill_can_still_be_activated() {
        let mut reg = registry();
        reg.activate("ops").unwrap();
        assert!(reg.active_instructions().unwrap().contains("Secret runbook."));
    }
}

// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use crate::skills::SkillRegistry;

/// System prompt used by subagents spawned through `create_subagent`.
pub const SUBAGENT_SYSTEM_PROMPT: &str = "\
You are a focused subagent. Complete the task you were given using the \
available tools, then reply with a single final answer containing everything \
the caller needs. Do not ask questions; make reasonable assumptions and note \
them in your answer.";

/// Render the full system prompt for one turn: base instructions, the skill
/// catalogue, and the instruction bodies of active skills.
pub fn render_system_prompt(base: &str, skills: &SkillRegistry) -> String {
    let mut prompt = base.to_string();

    if let Some(catalog) = skills.catalog() {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str("## Available skills\n");
        prompt.push_str(&catalog);
    }

    if let Some(instructions) = skills.active_instructions() {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(&instructions);
    }

    prompt
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::Skill;

    #[test]
    fn base_prompt_passes_through_without_skills() {
        let prompt = render_system_prompt("You are helpful.", &SkillRegistry::new());
        assert_eq!(prompt, "You are helpful.");
    }

    #[test]
    fn catalog_is_appended_when_skills_exist() {
        let mut skills = SkillRegistry::new();
        skills.add(Skill::new("git", "version control", "body"));
        let prompt = render_system_prompt("base", &skills);
        assert!(prompt.starts_with("base"));
        assert!(prompt.contains("## Available skills"));
        assert!(prompt.contains("- git: version control"));
        assert!(!prompt.contains("body"), "inactive skill body must not leak");
    }

    #[test]
    fn active_skill_instructions_are_injected() {
        let mut skills = SkillRegistry::new();
        skills.add(Skill::new("git", "version control", "Use rebase sparingly."));
        skills.activate("git").unwrap();
        let prompt = render_system_prompt("base", &skills);
        assert!(prompt.contains("Use rebase sparingly."));
    }

    #[test]
    fn empty_base_still_renders_skills() {
        let mut skills = SkillRegistry::new();
        skills.add(Skill::new("a", "b", "c"));
        let prompt = render_system_prompt("", &skills);
        assert!(prompt.starts_with("## Available skills"));
    }
}

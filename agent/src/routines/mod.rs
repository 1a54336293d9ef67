//! The routine set.
//!
//! A routine is a named behavior with a priority; the worker walks the set
//! in descending priority and runs the first whose `can_run` holds. Rest
//! outranks everything, events outrank chores, and the skill rotation is the
//! fallback that keeps a character busy when nothing urgent applies.

pub mod deposit;
pub mod event;
pub mod expansion;
pub mod rest;
pub mod rotation;
pub mod task;

use std::sync::Arc;

use crate::context::CharacterContext;

#[async_trait::async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> u32;
    async fn can_run(&self, ctx: &CharacterContext) -> bool;
    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()>;
}

/// The standard set, sorted by descending priority.
pub fn default_routines() -> Vec<Arc<dyn Routine>> {
    let mut routines: Vec<Arc<dyn Routine>> = vec![
        Arc::new(rest::Rest),
        Arc::new(event::EventRoutine),
        Arc::new(deposit::DepositBank),
        Arc::new(expansion::BankExpansion),
        Arc::new(task::CompleteTask),
        Arc::new(rotation::SkillRotation),
    ];
    routines.sort_by(|a, b| b.priority().cmp(&a.priority()));
    routines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_is_priority_sorted() {
        let routines = default_routines();
        let priorities: Vec<u32> = routines.iter().map(|r| r.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert_eq!(routines.first().unwrap().name(), "rest");
        assert_eq!(routines.last().unwrap().name(), "skill_rotation");
    }
}

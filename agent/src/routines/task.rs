use tracing::info;

use crate::context::CharacterContext;
use crate::routines::Routine;

/// Turn a finished task in at the tasks master and pick up the next one.
pub struct CompleteTask;

pub(crate) fn tasks_master_location(ctx: &CharacterContext, kind: &str) -> Option<(i32, i32)> {
    let data = ctx.services().data.clone();
    let spots = data.locations_of("tasks_master", kind);
    if let Some(spot) = spots.first() {
        return Some(*spot);
    }
    data.locations_of("tasks_master", "").first().copied()
}

#[async_trait::async_trait]
impl Routine for CompleteTask {
    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn priority(&self) -> u32 {
        45
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        ctx.settings().complete_task.enabled && ctx.live().task_complete()
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        let Some(task) = ctx.live().task.clone() else {
            return Ok(());
        };
        let Some((x, y)) = tasks_master_location(ctx, &task.kind) else {
            anyhow::bail!("no tasks master mapped for '{}'", task.kind);
        };

        ctx.move_to(x, y).await?;
        ctx.complete_task().await?;
        info!(character = %ctx.name(), task = %task.code, "task turned in");

        ctx.accept_task().await?;
        Ok(())
    }
}

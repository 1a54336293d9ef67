use crate::context::CharacterContext;
use crate::routines::Routine;

/// Rest until the target hp percentage once the trigger is crossed.
pub struct Rest;

#[async_trait::async_trait]
impl Routine for Rest {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn priority(&self) -> u32 {
        100
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        ctx.live().hp_pct() <= ctx.settings().rest.trigger_pct
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        let target = ctx.settings().rest.target_pct;
        let mut last_hp = ctx.live().hp;

        while ctx.live().hp_pct() < target {
            ctx.rest_action().await?;
            if ctx.live().hp <= last_hp {
                anyhow::bail!("rest made no progress at {} hp", ctx.live().hp);
            }
            last_hp = ctx.live().hp;
        }
        Ok(())
    }
}

use tracing::info;

use crate::core::error::LauncherResult;
use crate::core::events::{EventBus, LauncherEvent};

use super::context::InstallContext;
use super::step::{ClientJarStep, InstallStep, LibrariesStep, ModpackFilesStep};

/// Static dispatch over the known steps, no `Box<dyn>`.
pub enum Step {
    ClientJar(ClientJarStep),
    Libraries(LibrariesStep),
    ModpackFiles(ModpackFilesStep),
}

impl Step {
    fn stage(&self) -> &'static str {
        match self {
            Step::ClientJar(s) => s.stage(),
            Step::Libraries(s) => s.stage(),
            Step::ModpackFiles(s) => s.stage(),
        }
    }

    async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        match self {
            Step::ClientJar(s) => s.run(ctx).await,
            Step::Libraries(s) => s.run(ctx).await,
            Step::ModpackFiles(s) => s.run(ctx).await,
        }
    }
}

/// Runs install steps in order, reporting one `InstallStage` event per
/// step plus a final completion event.
pub struct InstallPipeline {
    steps: Vec<Step>,
    events: EventBus,
}

impl InstallPipeline {
    /// The full sequence a modpack install needs.
    pub fn standard(events: EventBus) -> Self {
        Self::with_steps(
            vec![
                Step::ClientJar(ClientJarStep),
                Step::Libraries(LibrariesStep),
                Step::ModpackFiles(ModpackFilesStep),
            ],
            events,
        )
    }

    pub fn with_steps(steps: Vec<Step>, events: EventBus) -> Self {
        Self { steps, events }
    }

    pub async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let total = self.steps.len() as u64;

        for (index, step) in self.steps.iter().enumerate() {
            self.events.emit(LauncherEvent::InstallStage {
                stage: step.stage().to_string(),
                current: index as u64,
                total,
                message: format!("Installing {} for {}", step.stage(), ctx.version.id),
            });

            step.run(ctx).await?;
            info!("Install stage '{}' complete", step.stage());
        }

        self.events.emit(LauncherEvent::InstallStage {
            stage: "complete".into(),
            current: total,
            total,
            message: "Installation complete".into(),
        });

        Ok(())
    }
}

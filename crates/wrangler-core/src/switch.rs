use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::{deadline_after, is_past, CancellationSignal};
use crate::config::TimingConfig;
use crate::error::Result;
use crate::types::ClassJob;
use crate::world::{Character, DialogKind, InteractionSurface, Services};

/// Changes the active class and waits for the host to confirm it.
#[derive(Clone)]
pub struct ClassSwitcher {
    character: Arc<dyn Character>,
    surface: Arc<dyn InteractionSurface>,
    timing: TimingConfig,
}

impl ClassSwitcher {
    pub fn new(services: &Services, timing: TimingConfig) -> Self {
        Self {
            character: Arc::clone(&services.character),
            surface: Arc::clone(&services.surface),
            timing,
        }
    }

    /// `Ok(false)` when the change was not confirmed within the switch
    /// timeout. A yes/no confirmation prompt is accepted inline.
    pub async fn change_class(&self, class: ClassJob, cancel: &CancellationSignal) -> Result<bool> {
        if self.character.current_class() == Some(class) {
            return Ok(true);
        }
        cancel.check()?;
        info!(class = %class, "changing class");
        self.character.request_class_change(class);

        let deadline = deadline_after(self.timing.class_switch_timeout());
        loop {
            if self.character.current_class() == Some(class) {
                return Ok(true);
            }
            if self.surface.is_open(DialogKind::SelectYesNo) {
                self.surface.choose(DialogKind::SelectYesNo, 0);
            }
            if is_past(deadline) {
                warn!(
                    class = %class,
                    current = ?self.character.current_class(),
                    "class change not confirmed"
                );
                return Ok(false);
            }
            cancel.sleep(self.timing.tick_interval()).await?;
        }
    }

    /// Delay, switch, equip recommended gear, delay.
    pub async fn switch_and_equip(
        &self,
        class: ClassJob,
        cancel: &CancellationSignal,
    ) -> Result<bool> {
        cancel.sleep(self.timing.class_switch_delay()).await?;
        if !self.change_class(class, cancel).await? {
            return Ok(false);
        }
        self.character.equip_recommended();
        cancel.sleep(self.timing.class_switch_delay()).await?;
        Ok(true)
    }
}

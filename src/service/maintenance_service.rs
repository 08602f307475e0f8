use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::{ActorRef, MaintenanceConfig, MaintenanceStatus, Role, UpdateMaintenanceRequest},
    error::Result,
    repository::MaintenanceRepository,
};

pub struct MaintenanceService {
    repo: Arc<dyn MaintenanceRepository>,
}

impl MaintenanceService {
    pub fn new(repo: Arc<dyn MaintenanceRepository>) -> Self {
        Self { repo }
    }

    /// Public status projection; `can_bypass` is computed for `role`.
    pub async fn status(&self, role: Option<Role>) -> Result<MaintenanceStatus> {
        Ok(self.repo.get().await?.status_for(role))
    }

    pub async fn config(&self) -> Result<MaintenanceConfig> {
        self.repo.get().await
    }

    pub async fn update(
        &self,
        request: UpdateMaintenanceRequest,
        actor: &ActorRef,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceConfig> {
        let mut config = self.repo.get().await?;
        let was_on = config.is_maintenance_mode;

        request.apply_to(&mut config);
        config.updated_by = Some(actor.id);
        config.updated_at = now;

        let saved = self.repo.save(config).await?;

        match (was_on, saved.is_maintenance_mode) {
            (false, true) => tracing::warn!(
                actor = %actor.id,
                maintenance_type = saved.maintenance_type.as_str(),
                "Maintenance mode enabled"
            ),
            (true, false) => tracing::info!(actor = %actor.id, "Maintenance mode disabled"),
            _ => tracing::debug!(actor = %actor.id, "Maintenance config updated"),
        }

        Ok(saved)
    }
}

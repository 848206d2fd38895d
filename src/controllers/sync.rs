use crate::{
    domain::workout::{SyncReport, WorkoutSyncService},
    error::AppResult,
};

/// `sync` - the scheduled pipeline run
pub struct SyncController {
    sync_service: WorkoutSyncService,
}

impl SyncController {
    pub fn new(sync_service: WorkoutSyncService) -> Self {
        Self { sync_service }
    }

    pub async fn run(&mut self) -> AppResult<SyncReport> {
        tracing::info!("Initializing workout pipeline");

        // A missing token file is fine when client credentials can stand in
        self.sync_service.restore_token().await?;

        let report = self.sync_service.run().await?;

        tracing::info!(
            user_id = %report.user_id,
            cutoff = report.cutoff,
            fetched = report.fetched,
            upserted = report.upserted,
            "Pipeline completed"
        );

        Ok(report)
    }
}

use crate::core::{PickResult, Pipeline};
use crate::utils::error::Result;

pub struct PickEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> PickEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// extract + transform，不寫任何檔案
    pub async fn plan(&self) -> Result<PickResult> {
        tracing::info!("🔍 Reading target plate layouts...");
        let targets = self.pipeline.extract().await?;
        tracing::info!("Loaded {} target plates", targets.len());

        tracing::info!("🔍 Resolving transfers...");
        let result = self.pipeline.transform(targets).await?;
        tracing::info!(
            "Resolved {} transfers from {} source plates",
            result.plan.len(),
            result.inventory.plate_count()
        );

        Ok(result)
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting cherry-pick run");

        let result = self.plan().await?;

        tracing::info!("📁 Writing output files...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::SourceInventory;
    use crate::domain::model::PlateFormat;
    use crate::domain::plan::TransferPlan;
    use crate::domain::plate::TargetPlate;
    use crate::utils::error::PickError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        loads: AtomicUsize,
        fail_extract: bool,
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<Vec<TargetPlate>> {
            if self.fail_extract {
                return Err(PickError::NoLayoutsError {
                    location: "layouts".to_string(),
                });
            }
            Ok(vec![TargetPlate::new("Synthesis1", PlateFormat::WELLS_96)])
        }

        async fn transform(&self, targets: Vec<TargetPlate>) -> Result<PickResult> {
            Ok(PickResult {
                destination_plates: targets.iter().map(|t| t.id().to_string()).collect(),
                demand: BTreeMap::new(),
                plan: TransferPlan::default(),
                inventory: SourceInventory::new(1),
            })
        }

        async fn load(&self, result: PickResult) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("out/{}", result.destination_plates.join(",")))
        }
    }

    #[tokio::test]
    async fn test_run_executes_all_stages() {
        let engine = PickEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_extract: false,
        });

        let output = engine.run().await.unwrap();

        assert_eq!(output, "out/Synthesis1");
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_load() {
        let engine = PickEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_extract: false,
        });

        let result = engine.plan().await.unwrap();

        assert_eq!(result.destination_plates, vec!["Synthesis1"]);
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_failure_stops_the_run() {
        let engine = PickEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_extract: true,
        });

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, PickError::NoLayoutsError { .. }));
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 0);
    }
}

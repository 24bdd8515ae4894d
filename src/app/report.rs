use crate::domain::inventory::WellUsage;
use crate::domain::model::{BuildingBlockId, Volume};
use crate::domain::plan::PickResult;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub step: u32,
    pub transfers: usize,
    pub file: Option<String>,
}

/// 執行摘要；體積欄位單位為 nL
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_name: String,
    pub generated_at: DateTime<Utc>,
    pub destination_plates: Vec<String>,
    pub source_plates: Vec<String>,
    pub transfer_count: usize,
    pub steps: Vec<StepSummary>,
    pub demand: BTreeMap<BuildingBlockId, usize>,
    pub volume_by_block_nl: BTreeMap<BuildingBlockId, Volume>,
    pub source_usage: Vec<WellUsage>,
}

impl RunReport {
    /// `step_files` 為已寫出的 (步驟, 檔名)；乾跑時傳空切片
    pub fn build(run_name: &str, result: &PickResult, step_files: &[(u32, String)]) -> Self {
        let steps = result
            .plan
            .steps()
            .into_iter()
            .map(|step| StepSummary {
                step,
                transfers: result.plan.for_step(step).count(),
                file: step_files
                    .iter()
                    .find(|(s, _)| *s == step)
                    .map(|(_, name)| name.clone()),
            })
            .collect();

        Self {
            run_name: run_name.to_string(),
            generated_at: Utc::now(),
            destination_plates: result.destination_plates.clone(),
            source_plates: result
                .inventory
                .plates()
                .iter()
                .map(|p| p.id().to_string())
                .collect(),
            transfer_count: result.plan.len(),
            steps,
            demand: result.demand.clone(),
            volume_by_block_nl: result.plan.volume_by_block(),
            source_usage: result.inventory.usage(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// 給終端機看的簡短摘要
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} transfers into {} destination plates from {} source plates",
            self.transfer_count,
            self.destination_plates.len(),
            self.source_plates.len()
        )];
        for step in &self.steps {
            match &step.file {
                Some(file) => lines.push(format!("step {}: {} transfers -> {}", step.step, step.transfers, file)),
                None => lines.push(format!("step {}: {} transfers", step.step, step.transfers)),
            }
        }
        lines
    }
}

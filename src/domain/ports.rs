use crate::domain::plan::PickResult;
use crate::domain::plate::TargetPlate;
use crate::utils::error::Result;
use async_trait::async_trait;

/// 檔案存取介面；路徑一律為字串，實作自行決定根目錄
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 遞迴列出目錄下所有檔案，依路徑排序
    fn list_files(&self, dir: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<TargetPlate>>;
    async fn transform(&self, targets: Vec<TargetPlate>) -> Result<PickResult>;
    async fn load(&self, result: PickResult) -> Result<String>;
}

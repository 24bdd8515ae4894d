pub mod cherry_pick_pipeline;

pub use cherry_pick_pipeline::CherryPickPipeline;

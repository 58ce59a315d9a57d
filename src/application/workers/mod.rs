pub mod analysis_worker;
pub mod control_worker;
pub mod execution_worker;
pub mod stream_worker;

pub use analysis_worker::AnalysisWorker;
pub use control_worker::ControlWorker;
pub use execution_worker::ExecutionWorker;
pub use stream_worker::StreamWorker;

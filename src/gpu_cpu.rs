use crate::compile::KernelConfig;
use crate::error::SaltmineError;
use crate::search::{self, LaunchOutcome, LaunchParams};

/// CPU implementation of the salt search engine. Work items are spread
/// over the rayon pool instead of a device queue.
pub struct GpuSaltMiner {
    cfg: KernelConfig,
}

impl GpuSaltMiner {
    pub fn new(cfg: &KernelConfig) -> Result<Self, SaltmineError> {
        Ok(Self { cfg: cfg.clone() })
    }

    pub fn device_name(&self) -> String {
        format!("cpu ({} threads)", rayon::current_num_threads())
    }

    /// Deterministic launch shape for the host CPU.
    pub fn launch_params(&self) -> LaunchParams {
        let threads = rayon::current_num_threads().max(1);
        let variants = self.cfg.variants.len().max(1) as u32;
        LaunchParams {
            global_size: threads * 256,
            local_size: None,
            iterations: (1024 / variants).max(8),
        }
    }

    pub fn run_launch(
        &mut self,
        base_salt: [u32; 4],
        params: &LaunchParams,
    ) -> Result<LaunchOutcome, SaltmineError> {
        Ok(search::run_launch(&self.cfg, base_salt, params))
    }
}

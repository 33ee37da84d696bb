use crate::compile::KernelConfig;
use crate::error::SaltmineError;
use crate::search::{self, HitRecord, LaunchOutcome, LaunchParams, RES_SLOTS, RES_SLOT_WORDS};

use ocl::enums::{DeviceInfo, DeviceInfoResult};
use ocl::{flags, Buffer, ProQue};

/// OpenCL implementation of the salt search engine. Device loss is not
/// fatal: any failure falls back to the CPU path for that launch.
pub struct GpuSaltMiner {
    cfg: KernelConfig,
    device: Option<GpuDevice>,
}

struct GpuDevice {
    pro_que: ProQue,
    found: Buffer<u32>,
    results: Buffer<u32>,
    name: String,
    params: LaunchParams,
}

impl GpuSaltMiner {
    pub fn new(cfg: &KernelConfig) -> Result<Self, SaltmineError> {
        let cfg = cfg.clone();
        let device = match init_device(&cfg) {
            Ok(dev) => Some(dev),
            Err(e) => {
                eprintln!("GPU init failed, falling back to CPU: {e}");
                None
            }
        };
        Ok(Self { cfg, device })
    }

    pub fn device_name(&self) -> String {
        match &self.device {
            Some(dev) => dev.name.clone(),
            None => format!("cpu ({} threads)", rayon::current_num_threads()),
        }
    }

    pub fn launch_params(&self) -> LaunchParams {
        match &self.device {
            Some(dev) => dev.params,
            None => {
                let threads = rayon::current_num_threads().max(1);
                let variants = self.cfg.variants.len().max(1) as u32;
                LaunchParams {
                    global_size: threads * 256,
                    local_size: None,
                    iterations: (1024 / variants).max(8),
                }
            }
        }
    }

    pub fn run_launch(
        &mut self,
        base_salt: [u32; 4],
        params: &LaunchParams,
    ) -> Result<LaunchOutcome, SaltmineError> {
        if let Some(dev) = &self.device {
            match run_gpu(dev, base_salt, params) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => eprintln!("GPU error {e}, falling back to CPU"),
            }
        }
        Ok(search::run_launch(&self.cfg, base_salt, params))
    }
}

fn init_device(cfg: &KernelConfig) -> Result<GpuDevice, SaltmineError> {
    let src = render_kernel_source(cfg);
    let pro_que = ProQue::builder()
        .src(src)
        .dims(1)
        .build()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;

    let device = pro_que.device();
    let name = device
        .name()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;
    let vendor = device
        .vendor()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;
    let compute_units = match device.info(DeviceInfo::MaxComputeUnits) {
        Ok(DeviceInfoResult::MaxComputeUnits(n)) => n,
        _ => 1,
    };
    let max_wg_size = device
        .max_wg_size()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;
    let params = pick_device_params(&vendor, compute_units, max_wg_size, cfg.variants.len());

    let queue = pro_que.queue().clone();
    let found = Buffer::<u32>::builder()
        .queue(queue.clone())
        .flags(flags::MEM_READ_WRITE)
        .len(1)
        .build()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;
    let results = Buffer::<u32>::builder()
        .queue(queue)
        .flags(flags::MEM_READ_WRITE)
        .len(RES_SLOTS * RES_SLOT_WORDS)
        .build()
        .map_err(|e| SaltmineError::Device(e.to_string()))?;

    Ok(GpuDevice {
        pro_que,
        found,
        results,
        name,
        params,
    })
}

/// Deterministic per-device launch shape, keyed on the vendor string.
fn pick_device_params(
    vendor: &str,
    compute_units: u32,
    max_wg_size: usize,
    n_variants: usize,
) -> LaunchParams {
    let vendor = vendor.to_ascii_lowercase();
    let (per_cu, local, iterations) = if vendor.contains("nvidia")
        || vendor.contains("advanced micro devices")
        || vendor.contains("amd")
    {
        (2048usize, 256usize, 4096u32)
    } else if vendor.contains("apple") {
        (1024, 256, 2048)
    } else {
        (1024, 128, 2048)
    };
    let iterations = if n_variants > 0 {
        (iterations / n_variants as u32).max(512)
    } else {
        iterations
    };
    LaunchParams {
        global_size: (compute_units as usize * per_cu).max(1024),
        local_size: Some(local.min(max_wg_size)),
        iterations,
    }
}

fn run_gpu(dev: &GpuDevice, base_salt: [u32; 4], params: &LaunchParams) -> ocl::Result<LaunchOutcome> {
    dev.found.cmd().fill(0u32, None).enq()?;

    let mut builder = dev.pro_que.kernel_builder("hash_main");
    builder
        .arg(params.iterations as i32)
        .arg(base_salt[0])
        .arg(base_salt[1])
        .arg(base_salt[2])
        .arg(base_salt[3])
        .arg(&dev.found)
        .arg(&dev.results)
        .global_work_size(params.global_size);
    if let Some(local) = params.local_size {
        builder.local_work_size(local);
    }
    let kernel = builder.build()?;
    unsafe {
        kernel.enq()?;
    }

    let mut count = vec![0u32; 1];
    dev.found.read(&mut count).enq()?;
    let found = count[0];

    let stored = (found as usize).min(RES_SLOTS);
    let mut hits = Vec::new();
    if stored > 0 {
        let mut raw = vec![0u32; RES_SLOTS * RES_SLOT_WORDS];
        dev.results.read(&mut raw).enq()?;
        let records: &[HitRecord] = bytemuck::cast_slice(&raw);
        hits.extend_from_slice(&records[..stored]);
    }
    Ok(LaunchOutcome { found, hits })
}

// ----------------------------------------------------------------------
// Kernel source rendering

/// Substitute the compiled tables into the kernel template.
pub fn render_kernel_source(cfg: &KernelConfig) -> String {
    let mut src = include_str!("kernel.cl").to_string();
    let mut put = |tag: &str, value: String| {
        src = src.replace(tag, &value);
    };

    put("<<N_VARIANTS>>", cfg.variants.len().to_string());
    put("<<N_NOCRC>>", cfg.prefix_pos_nocrc.len().to_string());
    put("<<N_CASE_CONST>>", cfg.case_const.len().to_string());
    put("<<N_CASE_VAR>>", cfg.case_var.len().to_string());
    put("<<NEED_CRC>>", (cfg.need_crc as u8).to_string());
    put("<<SWEEP_HASH0>>", (cfg.sweep_hash0 as u8).to_string());
    put("<<HASH0_COUNT>>", cfg.hash0_values.len().to_string());

    put("<<FLAGS_HI>>", cfg.flags_hi.to_string());
    put("<<FLAGS_LO>>", cfg.flags_lo.to_string());
    put("<<FREE_WINDOW_MASK>>", cfg.free_window_mask.to_string());
    put("<<FREE_HASH_MASK>>", cfg.free_hash_mask.to_string());
    put("<<FREE_HASH_VAL>>", cfg.free_hash_val.to_string());
    put("<<MASK34>>", cfg.prefix_mask[34].to_string());
    put("<<VAL34>>", cfg.prefix_val[34].to_string());
    put("<<MASK35>>", cfg.prefix_mask[35].to_string());
    put("<<VAL35>>", cfg.prefix_val[35].to_string());

    put(
        "<<CODE_STATE_BASE>>",
        cfg.code_state_base
            .iter()
            .map(|w| format!("0x{w:08x}u"))
            .collect::<Vec<_>>()
            .join(", "),
    );
    put("<<CRC16_TABLE>>", join_words(&cfg.crc16_table));
    put("<<CRC16_DELTA_POS2>>", join_words(&cfg.crc16_delta_pos2));
    put(
        "<<PREFIX_W_MATRIX>>",
        cfg.variants
            .iter()
            .map(|v| {
                let words = v
                    .prefix_w
                    .iter()
                    .map(|w| format!("0x{w:08x}u"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {words} }}")
            })
            .collect::<Vec<_>>()
            .join(",\n    "),
    );
    put(
        "<<STATEINIT_PREFIX_LENS>>",
        cfg.variants
            .iter()
            .map(|v| v.prefix.len().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );
    put("<<PREFIX_MASK>>", join_bytes(&cfg.prefix_mask));
    put("<<PREFIX_VAL>>", join_bytes(&cfg.prefix_val));
    put("<<NOCRC_DIM>>", dim(cfg.prefix_pos_nocrc.len()));
    put("<<PREFIX_POS_NOCRC>>", join_bytes(&cfg.prefix_pos_nocrc));

    put("<<CASE_CONST_DIM>>", dim(cfg.case_const.len()));
    put(
        "<<CASE_CONST_BIT>>",
        join_list(cfg.case_const.iter().map(|c| c.bit as u32)),
    );
    put(
        "<<CASE_CONST_ALT0>>",
        join_list(cfg.case_const.iter().map(|c| c.alt0 as u32)),
    );
    put(
        "<<CASE_CONST_ALT1>>",
        join_list(cfg.case_const.iter().map(|c| c.alt1 as u32)),
    );
    put("<<CASE_VAR_DIM>>", dim(cfg.case_var.len()));
    put(
        "<<CASE_VAR_BIT>>",
        join_list(cfg.case_var.iter().map(|c| c.bit as u32)),
    );
    put(
        "<<CASE_VAR_ALT0>>",
        join_list(cfg.case_var.iter().map(|c| c.alt0 as u32)),
    );
    put(
        "<<CASE_VAR_ALT1>>",
        join_list(cfg.case_var.iter().map(|c| c.alt1 as u32)),
    );
    put("<<HASH0_DIM>>", dim(cfg.hash0_values.len()));
    put("<<HASH0_VALUES>>", join_bytes(&cfg.hash0_values));

    src
}

fn dim(len: usize) -> String {
    len.max(1).to_string()
}

fn join_bytes(values: &[u8]) -> String {
    join_list(values.iter().map(|&v| v as u32))
}

fn join_words(values: &[u16]) -> String {
    join_list(values.iter().map(|&v| v as u32))
}

fn join_list(values: impl Iterator<Item = u32>) -> String {
    let items: Vec<String> = values.map(|v| v.to_string()).collect();
    if items.is_empty() {
        "0".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, MinerOptions};

    #[test]
    fn render_leaves_no_placeholders() {
        let opts = MinerOptions {
            owner: "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c".into(),
            end: Some("abc".into()),
            ..MinerOptions::default()
        };
        let cfg = compile(&opts).unwrap();
        let src = render_kernel_source(&cfg);
        assert!(!src.contains("<<"), "unresolved placeholder in kernel source");
        assert!(src.contains("__kernel void hash_main"));
    }
}

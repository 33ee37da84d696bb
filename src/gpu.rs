//! GpuSaltMiner is provided by either a CPU fallback or an OpenCL-aware
//! implementation depending on the `gpu` feature flag.

// With the `gpu` feature enabled we compile the OpenCL implementation in
// `gpu_impl.rs`. Otherwise we fall back to a pure CPU engine contained in
// `gpu_cpu.rs`. Both expose the same type with the same methods.
#[cfg(feature = "gpu")]
#[path = "gpu_impl.rs"]
mod gpu_backend;
#[cfg(not(feature = "gpu"))]
#[path = "gpu_cpu.rs"]
mod gpu_backend;

pub use gpu_backend::GpuSaltMiner;

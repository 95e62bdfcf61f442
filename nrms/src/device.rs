use candle_core::{Device, Result};

/// Picks the best available compute device: CUDA, then Metal, then CPU.
pub fn get_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    {
        let device = Device::cuda_if_available(0)?;
        if device.is_cuda() {
            return Ok(device);
        }
        log::warn!("cuda feature enabled but no CUDA device was found");
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => return Ok(device),
            Err(e) => log::warn!("metal feature enabled but unavailable: {}", e),
        }
    }

    Ok(Device::Cpu)
}

use candle_core::Device;
use tracing::info;

/// Metal when compiled in and available, CPU otherwise.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            info!("device: metal");
            return dev;
        }
    }
    info!("device: cpu");
    Device::Cpu
}

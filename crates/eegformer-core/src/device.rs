use std::fmt;

// Device — where a tensor's storage lives
//
// There is no process-wide "current device". Every constructor that
// allocates (layers, augmentation output, dataset batches) takes a
// `&Device` argument, and binary ops refuse to mix devices.
//
// Only host memory is implemented; accelerator variants would slot in
// here alongside their own kernels.

/// Identifies a compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host memory, kernels run on the calling thread plus the rayon pool.
    #[default]
    Cpu,
}

impl Device {
    /// A human-readable name for this device (e.g., "cpu").
    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

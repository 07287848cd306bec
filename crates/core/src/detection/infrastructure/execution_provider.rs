use crate::detection::domain::detector_options::PerformanceMode;

/// Execution providers for a performance mode.
///
/// `Fast` prefers the platform accelerator (which may run reduced
/// precision); `Accurate` pins inference to the default CPU provider.
pub fn execution_providers_for(
    mode: PerformanceMode,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    match mode {
        PerformanceMode::Accurate => vec![],
        PerformanceMode::Fast => platform_accelerators(),
    }
}

fn platform_accelerators() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accurate_mode_uses_cpu_only() {
        assert!(execution_providers_for(PerformanceMode::Accurate).is_empty());
    }
}

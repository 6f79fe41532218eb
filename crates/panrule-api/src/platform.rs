/// The platform type of the appliance.
///
/// Determines which configuration tree holds the rulebases: a standalone
/// firewall keeps them under virtual systems, Panorama under device-groups
/// with separate pre- and post-rulebases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Standalone next-generation firewall (PA-series or VM-series).
    Firewall,
    /// Panorama centralized management (virtual or M-series appliance).
    Panorama,
}

impl Platform {
    /// Infer the platform from the `<model>` reported by `show system info`.
    ///
    /// Panorama reports `Panorama` for the virtual appliance and `M-<n>`
    /// for hardware; everything else is a firewall.
    pub fn from_model(model: &str) -> Self {
        let model = model.trim();
        if model.eq_ignore_ascii_case("panorama") || model.starts_with("M-") {
            Self::Panorama
        } else {
            Self::Firewall
        }
    }

    /// Whether this platform manages other devices.
    pub fn is_controller(&self) -> bool {
        matches!(self, Self::Panorama)
    }
}

#[cfg(test)]
mod tests {
    use super::Platform;

    #[test]
    fn detects_panorama_models() {
        assert_eq!(Platform::from_model("Panorama"), Platform::Panorama);
        assert_eq!(Platform::from_model("M-600"), Platform::Panorama);
        assert_eq!(Platform::from_model("PA-3220"), Platform::Firewall);
        assert_eq!(Platform::from_model("PA-VM"), Platform::Firewall);
    }
}

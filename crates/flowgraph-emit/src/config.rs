use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub use_colors: bool,
    pub verbosity: VerbosityLevel,
    /// Label exceptional edges with their cause instead of a bare `exception`.
    pub show_exception_types: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            verbosity: VerbosityLevel::Normal,
            show_exception_types: true,
        }
    }
}

impl EmitterConfig {
    pub fn plain() -> Self {
        Self {
            use_colors: false,
            ..Self::default()
        }
    }

    pub fn with_verbosity(mut self, verbosity: VerbosityLevel) -> Self {
        self.verbosity = verbosity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerbosityLevel {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl VerbosityLevel {
    pub fn should_print_nodes(&self) -> bool {
        !matches!(self, VerbosityLevel::Quiet)
    }

    pub fn should_print_types(&self) -> bool {
        matches!(self, VerbosityLevel::Verbose | VerbosityLevel::Debug)
    }

    pub fn should_print_ids(&self) -> bool {
        matches!(self, VerbosityLevel::Debug)
    }

    pub fn should_print_tree_ids(&self) -> bool {
        matches!(self, VerbosityLevel::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_gates() {
        assert!(!VerbosityLevel::Quiet.should_print_nodes());
        assert!(VerbosityLevel::Normal.should_print_nodes());
        assert!(!VerbosityLevel::Normal.should_print_types());
        assert!(VerbosityLevel::Verbose.should_print_types());
        assert!(!VerbosityLevel::Verbose.should_print_ids());
        assert!(VerbosityLevel::Debug.should_print_ids());
        assert!(VerbosityLevel::Debug.should_print_tree_ids());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EmitterConfig::plain().with_verbosity(VerbosityLevel::Verbose);
        let json = serde_json::to_string(&config).unwrap();
        let back: EmitterConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.use_colors);
        assert_eq!(back.verbosity, VerbosityLevel::Verbose);
        assert!(back.show_exception_types);
    }
}

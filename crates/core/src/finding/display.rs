use std::fmt;

use super::types::{GasOptimizationFinding, VulnerabilityFinding};

impl fmt::Display for VulnerabilityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.title)?;
        if let Some(location) = &self.code_location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

impl fmt::Display for GasOptimizationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.difficulty, self.optimization_type, self.title
        )?;
        if let Some(savings) = self.estimated_gas_savings {
            write!(f, " (~{} gas)", savings)?;
        }
        Ok(())
    }
}

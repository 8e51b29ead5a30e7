pub mod blocks;
pub mod detector;
pub mod synth;

pub use blocks::{fenced_blocks, CodeBlock, CodeBlockExtractor, LabelBasis, LabeledBlock};
pub use detector::OptimizationDetector;
pub use synth::{CodeSynthesizer, Identifiers, SynthesisRules, TransformRule};

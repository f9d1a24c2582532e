//! pcbscan-pipeline: PCB defect detection against a golden reference.
//!
//! Compares a photographed board with a known-good reference image:
//! similarity score -> highlighted differences -> changed-region
//! extraction -> per-region classification -> report and netlist.
//!
//! This crate performs no output I/O. The only file access is decoding
//! the two inputs in [`Inspector::analyze`]; everything else operates on
//! in-memory images and returns structured data. Writing artifacts
//! lives in `pcbscan-export` and the `pcbscan` binary.
//!
//! The classifier is injected through the [`Classifier`] trait, so any
//! inference backend (or a fixed-score test double) can drive the
//! pipeline.

pub mod aggregate;
pub mod classify;
pub mod color;
pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod diff;
pub mod feedback;
pub mod inspector;
pub mod mask;
pub mod netlist;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod regions;
pub mod report;
pub mod resize;
pub mod similarity;
pub mod types;

pub use aggregate::{Annotated, CategoryCounts, LabelStyle, aggregate};
pub use classify::{
    ChannelOrder, Classifier, ClassifierError, ClassifierInput, FixedClassifier,
    RegionGeometryError, RegionOutcome, SkippedRegion,
};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use color::{Hsv, HsvImage, HsvRange};
pub use diagnostics::{Clock, InspectionDiagnostics};
pub use feedback::{Remediation, feedback};
pub use inspector::{Analysis, Inspector, synthesize_netlist};
pub use netlist::Netlist;
pub use regions::extract_regions;
pub use report::{DefectReport, ReportSummary, build_report};
pub use resize::{ResampleFilter, resize_to_match};
pub use similarity::score;
pub use types::{
    BoundingBox, Defect, DefectCategory, Dimensions, Grade, GrayImage, InspectionConfig,
    PipelineError, RgbImage, SimilarityResult,
};

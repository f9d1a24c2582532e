//! ONNX Runtime classifier backend (`onnx` feature).
//!
//! Loads an image-classification model exported to ONNX and feeds it
//! the crops prepared by the classification stage. The model must take
//! one `[1, size, size, 3]` `f32` tensor of raw `0..=255` intensities and
//! return one score per [`DefectCategory`], in table order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;
use tracing::info;

use crate::classify::{ChannelOrder, Classifier, ClassifierError, ClassifierInput};
use crate::types::DefectCategory;

/// Classifier backed by an ONNX Runtime session.
///
/// `Session::run` needs `&mut self`, so the session sits behind a
/// `Mutex` to keep [`Classifier::predict`] callable through `&self`.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    order: ChannelOrder,
    path: PathBuf,
}

impl OnnxClassifier {
    /// Load the model stored at `model_path`.
    ///
    /// `order` is the channel order the model was trained on; models
    /// trained on OpenCV-decoded images expect [`ChannelOrder::Bgr`].
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::Load`] if the file is missing or ONNX
    /// Runtime rejects it.
    pub fn load(model_path: &Path, order: ChannelOrder) -> Result<Self, ClassifierError> {
        let load_error = |reason: String| ClassifierError::Load {
            path: model_path.to_path_buf(),
            reason,
        };
        if !model_path.exists() {
            return Err(load_error("file not found".to_owned()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| load_error(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| load_error(e.to_string()))?;

        info!(path = %model_path.display(), ?order, "loaded ONNX classifier");
        Ok(Self {
            session: Mutex::new(session),
            order,
            path: model_path.to_path_buf(),
        })
    }

    /// Path the model was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("path", &self.path)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl Classifier for OnnxClassifier {
    fn num_classes(&self) -> usize {
        DefectCategory::ALL.len()
    }

    fn predict(&self, input: &ClassifierInput) -> Result<Vec<f32>, ClassifierError> {
        let side = input.size() as usize;
        let array = ndarray::Array4::from_shape_vec((1, side, side, 3), input.to_nhwc(self.order))
            .map_err(|e| ClassifierError::Backend(e.to_string()))?;
        let tensor = TensorRef::from_array_view(&array)
            .map_err(|e| ClassifierError::Backend(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Backend("session lock poisoned".to_owned()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::Backend(format!("inference failed: {e}")))?;

        let (shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Backend(format!("output extraction: {e}")))?;
        if scores.len() != self.num_classes() {
            return Err(ClassifierError::Backend(format!(
                "unexpected output shape {shape:?}, expected [1, {}]",
                self.num_classes()
            )));
        }
        Ok(scores.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_load_error() {
        let result = OnnxClassifier::load(Path::new("/nonexistent/model.onnx"), ChannelOrder::Bgr);
        assert!(matches!(result, Err(ClassifierError::Load { .. })));
    }
}
